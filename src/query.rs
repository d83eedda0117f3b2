//! Windowed row retrieval: validate, normalize, filter, sort, slice, count.
//!
//! Queries are assembled from column references that were checked against the
//! current schema and from literal expression values. Caller text never
//! becomes part of an expression's structure.

use polars::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::gateway::DatasetSnapshot;
use crate::schema::SchemaFacts;

/// One output row: column name to value, in schema order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    /// Accepts `asc`/`desc` in any case; everything else is ascending.
    pub fn parse_lenient(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn is_descending(self) -> bool {
        self == SortDirection::Descending
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

/// A request for one window of rows. Offsets are in rows, not pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub offset: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
}

impl QuerySpec {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_sort_by(mut self, column: impl Into<String>) -> Self {
        self.sort_by = Some(column.into());
        self
    }

    pub fn with_sort_dir(mut self, dir: impl Into<String>) -> Self {
        self.sort_dir = Some(dir.into());
        self
    }

    /// Validate against the schema and substitute defaults for soft inputs.
    pub fn resolve(&self, facts: &SchemaFacts) -> Result<ResolvedQuery> {
        let offset =
            usize::try_from(self.offset).map_err(|_| GatewayError::InvalidOffset(self.offset))?;
        if self.limit < 1 {
            return Err(GatewayError::InvalidLimit(self.limit));
        }
        let limit = usize::try_from(self.limit).map_err(|_| GatewayError::InvalidLimit(self.limit))?;

        let sort_column = match self.sort_by.as_deref() {
            Some(name) if facts.has_column(name) => name.to_string(),
            _ => facts.default_sort.clone(),
        };
        let sort_dir = self
            .sort_dir
            .as_deref()
            .map(SortDirection::parse_lenient)
            .unwrap_or_default();

        let search = match self.search.as_deref() {
            Some(term) if !term.is_empty() => {
                let column = facts
                    .searchable_column
                    .clone()
                    .ok_or(GatewayError::SearchUnavailable)?;
                Some((column, term.to_string()))
            }
            _ => None,
        };

        Ok(ResolvedQuery {
            offset,
            limit,
            sort_column,
            sort_dir,
            search,
        })
    }
}

/// A query whose column references are known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub offset: usize,
    pub limit: usize,
    pub sort_column: String,
    pub sort_dir: SortDirection,
    /// Searchable column and the search term
    pub search: Option<(String, String)>,
}

impl ResolvedQuery {
    /// Case-insensitive substring match of the term against the searchable column.
    pub fn predicate(&self) -> Option<Expr> {
        self.search.as_ref().map(|(column, term)| {
            col(column.as_str())
                .cast(DataType::String)
                .str()
                .to_lowercase()
                .str()
                .contains_literal(lit(term.to_lowercase()))
        })
    }

    /// Stable sort: rows with equal keys keep load order. Nulls sort last.
    fn sort_options(&self) -> SortMultipleOptions {
        SortMultipleOptions {
            descending: vec![self.sort_dir.is_descending()],
            nulls_last: vec![true],
            maintain_order: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RowPage {
    pub rows: Vec<Record>,
    pub total_rows: usize,
    pub total_filtered: usize,
    pub offset: usize,
    pub limit: usize,
    pub sort_by: String,
    pub sort_dir: SortDirection,
    pub search: String,
}

/// Run a query against one snapshot.
pub fn execute(snapshot: &DatasetSnapshot, spec: &QuerySpec) -> Result<RowPage> {
    let query = spec.resolve(&snapshot.facts)?;
    let predicate = query.predicate();

    let base = snapshot.frame.clone().lazy();
    let filtered = match &predicate {
        Some(p) => base.filter(p.clone()),
        None => base,
    };

    let window = filtered
        .clone()
        .sort_by_exprs([col(query.sort_column.as_str())], query.sort_options())
        .slice(
            query.offset as i64,
            IdxSize::try_from(query.limit).unwrap_or(IdxSize::MAX),
        )
        .collect()?;

    let total_filtered = match predicate {
        Some(_) => count_rows(filtered)?,
        None => snapshot.row_count,
    };

    debug!(
        offset = query.offset,
        limit = query.limit,
        sort_by = %query.sort_column,
        sort_dir = %query.sort_dir,
        searching = query.search.is_some(),
        returned = window.height(),
        total_filtered,
        "rows query"
    );

    Ok(RowPage {
        rows: frame_to_records(&window)?,
        total_rows: snapshot.row_count,
        total_filtered,
        offset: query.offset,
        limit: query.limit,
        sort_by: query.sort_column,
        sort_dir: query.sort_dir,
        search: query.search.map(|(_, term)| term).unwrap_or_default(),
    })
}

fn count_rows(lf: LazyFrame) -> Result<usize> {
    let df = lf.select([len()]).collect()?;
    let count = match df.get_columns().first() {
        Some(c) => c.get(0)?.extract::<usize>().unwrap_or(0),
        None => 0,
    };
    Ok(count)
}

fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>> {
    let columns = df.get_columns();
    (0..df.height())
        .map(|row| {
            columns
                .iter()
                .map(|c| Ok((c.name().to_string(), any_value_to_json(&c.get(row)?))))
                .collect::<Result<Record>>()
        })
        .collect()
}

/// JSON form of a cell. Temporal and nested values use their display form.
pub fn any_value_to_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => Value::from(f64::from(*v)),
        AnyValue::Float64(v) => Value::from(*v),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(df: DataFrame) -> DatasetSnapshot {
        let facts = SchemaFacts::inspect(&df).unwrap();
        DatasetSnapshot {
            row_count: df.height(),
            source_rows: df.height(),
            frame: df,
            facts,
            loaded_at: Utc::now(),
        }
    }

    fn questions() -> DatasetSnapshot {
        snapshot(
            df!(
                "doc_id" => &[3i64, 1, 2],
                "question" => &["What is X", "How to Y", "what about Z"]
            )
            .unwrap(),
        )
    }

    fn doc_ids(page: &RowPage) -> Vec<i64> {
        page.rows
            .iter()
            .map(|r| r["doc_id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse_lenient("DESC"), SortDirection::Descending);
        assert_eq!(SortDirection::parse_lenient("asc"), SortDirection::Ascending);
        assert_eq!(SortDirection::parse_lenient("sideways"), SortDirection::Ascending);
        assert_eq!(SortDirection::Descending.to_string(), "desc");
    }

    #[test]
    fn test_validation_errors() {
        let snap = questions();
        assert!(matches!(
            execute(&snap, &QuerySpec::new(-1, 10)),
            Err(GatewayError::InvalidOffset(-1))
        ));
        assert!(matches!(
            execute(&snap, &QuerySpec::new(0, 0)),
            Err(GatewayError::InvalidLimit(0))
        ));
    }

    #[test]
    fn test_search_without_searchable_column() {
        let snap = snapshot(df!("id" => &[1i32, 2]).unwrap());
        let err = execute(&snap, &QuerySpec::new(0, 10).with_search("x")).unwrap_err();
        assert!(matches!(err, GatewayError::SearchUnavailable));
        // an empty search is not a search
        assert!(execute(&snap, &QuerySpec::new(0, 10).with_search("")).is_ok());
    }

    #[test]
    fn test_default_sort_and_normalization() {
        let snap = questions();
        let page = execute(
            &snap,
            &QuerySpec::new(0, 10)
                .with_sort_by("__nonexistent__")
                .with_sort_dir("sideways"),
        )
        .unwrap();
        assert_eq!(page.sort_by, "doc_id");
        assert_eq!(page.sort_dir, SortDirection::Ascending);
        assert_eq!(doc_ids(&page), vec![1, 2, 3]);
        assert_eq!(page.search, "");
    }

    #[test]
    fn test_sort_descending_by_other_column() {
        let snap = questions();
        let page = execute(
            &snap,
            &QuerySpec::new(0, 10)
                .with_sort_by("question")
                .with_sort_dir("DESC"),
        )
        .unwrap();
        assert_eq!(page.sort_by, "question");
        assert_eq!(page.sort_dir, SortDirection::Descending);
        // byte order: lowercase sorts after uppercase
        assert_eq!(doc_ids(&page), vec![2, 3, 1]);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let snap = questions();
        let page = execute(&snap, &QuerySpec::new(0, 10).with_search("what")).unwrap();
        assert_eq!(page.total_filtered, 2);
        assert_eq!(page.total_rows, 3);
        assert_eq!(doc_ids(&page), vec![2, 3]);
        assert_eq!(page.search, "what");
    }

    #[test]
    fn test_search_term_is_literal() {
        let snap = snapshot(
            df!("question" => &["a.c", "abc", "(x)", "a%c"]).unwrap(),
        );
        let page = execute(&snap, &QuerySpec::new(0, 10).with_search(".")).unwrap();
        assert_eq!(page.total_filtered, 1);
        let page = execute(&snap, &QuerySpec::new(0, 10).with_search("(x")).unwrap();
        assert_eq!(page.total_filtered, 1);
        let page = execute(&snap, &QuerySpec::new(0, 10).with_search("%")).unwrap();
        assert_eq!(page.total_filtered, 1);
    }

    #[test]
    fn test_offset_past_end_returns_empty_page() {
        let snap = questions();
        let page = execute(&snap, &QuerySpec::new(5, 2)).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total_filtered, 3);
        assert_eq!(page.offset, 5);
        assert_eq!(page.limit, 2);
    }

    #[test]
    fn test_ties_keep_load_order_and_nulls_last() {
        let snap = snapshot(
            df!(
                "question" => &["q1", "q2", "q3", "q4", "q5"],
                "group" => &[Some(2i32), None, Some(1), Some(2), Some(1)]
            )
            .unwrap(),
        );
        let order = |dir: &str| -> Vec<String> {
            execute(
                &snap,
                &QuerySpec::new(0, 10).with_sort_by("group").with_sort_dir(dir),
            )
            .unwrap()
            .rows
            .iter()
            .map(|r| r["question"].as_str().unwrap().to_string())
            .collect()
        };
        assert_eq!(order("asc"), vec!["q3", "q5", "q1", "q4", "q2"]);
        assert_eq!(order("desc"), vec!["q1", "q4", "q3", "q5", "q2"]);
    }

    #[test]
    fn test_records_keep_schema_order_and_types() {
        let snap = snapshot(
            df!(
                "question" => &["a"],
                "score" => &[1.5f64],
                "n" => &[7i64],
                "flag" => &[true]
            )
            .unwrap(),
        );
        let page = execute(&snap, &QuerySpec::new(0, 1)).unwrap();
        let row = &page.rows[0];
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["question", "score", "n", "flag"]);
        assert_eq!(row["score"], Value::from(1.5));
        assert_eq!(row["n"], Value::from(7));
        assert_eq!(row["flag"], Value::Bool(true));
    }

    #[test]
    fn test_any_value_to_json() {
        assert_eq!(any_value_to_json(&AnyValue::Null), Value::Null);
        assert_eq!(any_value_to_json(&AnyValue::Float64(f64::NAN)), Value::Null);
        assert_eq!(any_value_to_json(&AnyValue::UInt32(4)), Value::from(4));
        assert_eq!(
            any_value_to_json(&AnyValue::String("hi")),
            Value::String("hi".to_string())
        );
    }
}
