//! Schema inspection: column descriptors plus the facts derived from them.
//!
//! Nothing here is configured. The default sort column and the searchable
//! column are recomputed from the live table every time it is (re)loaded.

use polars::prelude::*;
use serde::Serialize;

/// Columns preferred as the default sort, in order.
pub const DEFAULT_SORT_PREFERENCE: &[&str] = &["question_id", "doc_id", "question"];

/// Column name (matched case-insensitively) that enables text search.
pub const SEARCHABLE_COLUMN: &str = "question";

/// Semantic type tag for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Time,
    Duration,
    Other,
}

impl From<&DataType> for ColumnType {
    fn from(dtype: &DataType) -> Self {
        match dtype {
            DataType::String => ColumnType::Text,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Integer,
            DataType::Float32 | DataType::Float64 => ColumnType::Float,
            DataType::Boolean => ColumnType::Boolean,
            DataType::Date => ColumnType::Date,
            DataType::Datetime(_, _) => ColumnType::Datetime,
            DataType::Time => ColumnType::Time,
            DataType::Duration(_) => ColumnType::Duration,
            // CSV inference yields only bool, i64, f64, str, date and datetime.
            // 128-bit integers and decimals need the `dtype-i128` and
            // `dtype-decimal` features, which this crate does not enable.
            _ => ColumnType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Engine type name (e.g. `i64`, `str`)
    pub dtype: String,
}

/// Schema plus the defaults derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFacts {
    pub columns: Vec<ColumnDescriptor>,
    pub default_sort: String,
    pub searchable_column: Option<String>,
}

impl SchemaFacts {
    /// Inspect a materialized table. Returns `None` when the table has no columns.
    pub fn inspect(df: &DataFrame) -> Option<Self> {
        let columns = describe_columns(df);
        let default_sort = default_sort_column(&columns)?.to_string();
        let searchable_column = searchable_column(&columns).map(str::to_string);
        Some(Self {
            columns,
            default_sort,
            searchable_column,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Ordered descriptors for every column of the table.
pub fn describe_columns(df: &DataFrame) -> Vec<ColumnDescriptor> {
    df.get_columns()
        .iter()
        .map(|c| ColumnDescriptor {
            name: c.name().to_string(),
            column_type: ColumnType::from(c.dtype()),
            dtype: c.dtype().to_string(),
        })
        .collect()
}

/// First preferred column present in the schema, else the first column.
pub fn default_sort_column(columns: &[ColumnDescriptor]) -> Option<&str> {
    DEFAULT_SORT_PREFERENCE
        .iter()
        .find_map(|candidate| {
            columns
                .iter()
                .find(|c| c.name == *candidate)
                .map(|c| c.name.as_str())
        })
        .or_else(|| columns.first().map(|c| c.name.as_str()))
}

/// Original-case name of the searchable column, if the schema has one.
pub fn searchable_column(columns: &[ColumnDescriptor]) -> Option<&str> {
    columns
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(SEARCHABLE_COLUMN))
        .map(|c| c.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<ColumnDescriptor> {
        cols.iter()
            .map(|n| ColumnDescriptor {
                name: n.to_string(),
                column_type: ColumnType::Text,
                dtype: "str".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_default_sort_preference_order() {
        let cols = names(&["question", "doc_id", "question_id"]);
        assert_eq!(default_sort_column(&cols), Some("question_id"));

        let cols = names(&["question", "doc_id", "answer"]);
        assert_eq!(default_sort_column(&cols), Some("doc_id"));

        let cols = names(&["answer", "question"]);
        assert_eq!(default_sort_column(&cols), Some("question"));
    }

    #[test]
    fn test_default_sort_falls_back_to_first_column() {
        let cols = names(&["b", "a", "Question_ID"]);
        assert_eq!(default_sort_column(&cols), Some("b"));
        assert_eq!(default_sort_column(&[]), None);
    }

    #[test]
    fn test_csv_inferred_types_have_semantic_tags() {
        let csv = "id,big,ratio,flag,day,question\n\
                   1,9007199254740993,0.10,true,2024-01-31,a\n\
                   2,-9007199254740993,12.5,false,2024-02-01,b\n";
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .map_parse_options(|opts| opts.with_try_parse_dates(true))
            .into_reader_with_file_handle(std::io::Cursor::new(csv.as_bytes()))
            .finish()
            .unwrap();
        let types: Vec<ColumnType> = describe_columns(&df)
            .into_iter()
            .map(|c| c.column_type)
            .collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Integer,
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Boolean,
                ColumnType::Date,
                ColumnType::Text,
            ]
        );
    }

    #[test]
    fn test_searchable_column_keeps_original_case() {
        let cols = names(&["id", "Question"]);
        assert_eq!(searchable_column(&cols), Some("Question"));
        let cols = names(&["id", "questions"]);
        assert_eq!(searchable_column(&cols), None);
    }

    #[test]
    fn test_inspect_dataframe() {
        let df = df!(
            "doc_id" => &[1i64, 2],
            "QUESTION" => &["a", "b"],
            "score" => &[0.5f64, 1.5],
            "ok" => &[true, false]
        )
        .unwrap();
        let facts = SchemaFacts::inspect(&df).unwrap();
        assert_eq!(facts.default_sort, "doc_id");
        assert_eq!(facts.searchable_column.as_deref(), Some("QUESTION"));
        assert_eq!(
            facts.column_names(),
            vec!["doc_id", "QUESTION", "score", "ok"]
        );
        let types: Vec<ColumnType> = facts.columns.iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Integer,
                ColumnType::Text,
                ColumnType::Float,
                ColumnType::Boolean
            ]
        );
        assert!(facts.has_column("score"));
        assert!(!facts.has_column("Score"));
    }

    #[test]
    fn test_inspect_empty_frame() {
        assert!(SchemaFacts::inspect(&DataFrame::empty()).is_none());
    }

    #[test]
    fn test_column_descriptor_serializes_type_tag() {
        let col = ColumnDescriptor {
            name: "id".to_string(),
            column_type: ColumnType::Integer,
            dtype: "i64".to_string(),
        };
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["name"], "id");
    }
}
