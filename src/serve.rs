//! JSON-lines request loop over a [`DatasetGateway`].
//!
//! Each input line is one request object tagged by `op`. Each response is one
//! line carrying an HTTP-style `code`: 200 on success, 400 for caller mistakes
//! and malformed requests, 500 when loading or executing fails.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::GatewayError;
use crate::error_display::user_message_from_gateway;
use crate::gateway::{DatasetGateway, DatasetMetadata};
use crate::paging::PageRequest;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Metadata,
    Rows(PageRequest),
    Refresh,
}

#[derive(Debug, Serialize)]
struct MetadataResponse<'a> {
    #[serde(flatten)]
    metadata: DatasetMetadata,
    default_page_size: usize,
    max_page_size: usize,
    csv_display_name: String,
    app_title: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    status: &'static str,
    row_count: usize,
}

/// Answer one request line.
pub fn handle_line(gateway: &DatasetGateway, settings: &Settings, line: &str) -> Value {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle_request(gateway, settings, &request),
        Err(e) => error_body(400, format!("invalid request: {}", e)),
    }
}

pub fn handle_request(gateway: &DatasetGateway, settings: &Settings, request: &Request) -> Value {
    debug!(?request, "request");
    let result = match request {
        Request::Metadata => to_body(&MetadataResponse {
            metadata: gateway.get_metadata(),
            default_page_size: settings.default_page_size,
            max_page_size: settings.max_page_size,
            csv_display_name: settings.csv_display_name(),
            app_title: &settings.app_title,
        }),
        Request::Rows(page) => page
            .fetch(gateway, &settings.page_limits())
            .and_then(|rows| to_body(&rows)),
        Request::Refresh => gateway.refresh().and_then(|row_count| {
            to_body(&RefreshResponse {
                status: "ok",
                row_count,
            })
        }),
    };

    match result {
        Ok(body) => body,
        Err(e) => {
            let code = e.class().status_code();
            if code >= 500 {
                warn!(error = %e, "request failed");
            }
            error_body(code, user_message_from_gateway(&e))
        }
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, GatewayError> {
    let mut body = Map::new();
    body.insert("code".to_string(), Value::from(200));
    match serde_json::to_value(value)? {
        Value::Object(fields) => body.extend(fields),
        other => {
            body.insert("data".to_string(), other);
        }
    }
    Ok(Value::Object(body))
}

fn error_body(code: u16, detail: String) -> Value {
    json!({ "code": code, "detail": detail })
}

/// Read requests from `input` until EOF, writing one response line per request.
/// Blank lines are skipped. Returns the number of requests answered.
pub fn serve<R: BufRead, W: Write>(
    gateway: &DatasetGateway,
    settings: &Settings,
    input: R,
    mut output: W,
) -> io::Result<usize> {
    let mut answered = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(gateway, settings, &line);
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
        answered += 1;
    }
    debug!(answered, "input closed");
    Ok(answered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path, content: &str) -> (DatasetGateway, Settings) {
        let path = dir.join("questions.csv");
        fs::write(&path, content).unwrap();
        let mut config = AppConfig::default();
        config.source.path = path.display().to_string();
        config.paging.default_page_size = 2;
        config.paging.max_page_size = 3;
        let settings = Settings::from_config(&config).unwrap();
        let gateway = DatasetGateway::open(settings.gateway_config()).unwrap();
        (gateway, settings)
    }

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            serde_json::from_str::<Request>(r#"{"op":"metadata"}"#).unwrap(),
            Request::Metadata
        );
        let req: Request = serde_json::from_str(r#"{"op":"rows","page":2,"sort_dir":"desc"}"#).unwrap();
        match req {
            Request::Rows(page) => {
                assert_eq!(page.page, Some(2));
                assert_eq!(page.sort_dir.as_deref(), Some("desc"));
            }
            other => panic!("unexpected request: {:?}", other),
        }
        assert!(serde_json::from_str::<Request>(r#"{"op":"drop"}"#).is_err());
    }

    #[test]
    fn test_metadata_response() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, settings) = setup(dir.path(), "question,doc_id\na,1\nb,2\n");
        let body = handle_line(&gateway, &settings, r#"{"op":"metadata"}"#);
        assert_eq!(body["code"], 200);
        assert_eq!(body["row_count"], 2);
        assert_eq!(body["default_sort"], "doc_id");
        assert_eq!(body["csv_display_name"], "questions.csv");
        assert_eq!(body["default_page_size"], 2);
        assert_eq!(body["max_page_size"], 3);
        assert_eq!(body["columns"][0]["name"], "question");
    }

    #[test]
    fn test_rows_response_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, settings) = setup(dir.path(), "question,doc_id\na,1\nb,2\nc,3\n");

        let body = handle_line(&gateway, &settings, r#"{"op":"rows","page":2}"#);
        assert_eq!(body["code"], 200);
        assert_eq!(body["page"], 2);
        assert_eq!(body["page_size"], 2);
        assert_eq!(body["offset"], 2);
        assert_eq!(body["rows"][0]["question"], "c");
        assert_eq!(body["search"], "");

        let body = handle_line(&gateway, &settings, r#"{"op":"rows","page_size":4}"#);
        assert_eq!(body["code"], 400);
        assert_eq!(body["detail"], "page_size cannot exceed 3");

        let body = handle_line(&gateway, &settings, "not json");
        assert_eq!(body["code"], 400);
        assert!(body["detail"].as_str().unwrap().starts_with("invalid request"));
    }

    #[test]
    fn test_search_without_searchable_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.csv");
        fs::write(&path, "doc_id,text\n1,a\n").unwrap();
        let mut config = AppConfig::default();
        config.source.path = path.display().to_string();
        config.source.identity_column = "doc_id".to_string();
        let settings = Settings::from_config(&config).unwrap();
        let gateway = DatasetGateway::open(settings.gateway_config()).unwrap();

        let body = handle_line(&gateway, &settings, r#"{"op":"rows","search":"a"}"#);
        assert_eq!(body["code"], 400);
        assert_eq!(body["detail"], GatewayError::SearchUnavailable.to_string());
    }

    #[test]
    fn test_refresh_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, settings) = setup(dir.path(), "question\na\n");

        let body = handle_line(&gateway, &settings, r#"{"op":"refresh"}"#);
        assert_eq!(body, json!({"code": 200, "status": "ok", "row_count": 1}));

        fs::remove_file(&settings.csv_path).unwrap();
        let body = handle_line(&gateway, &settings, r#"{"op":"refresh"}"#);
        assert_eq!(body["code"], 500);
        assert_eq!(gateway.row_count(), 1);
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    #[test]
    fn test_encode_failure_is_server_error() {
        let err = to_body(&Unencodable).unwrap_err();
        assert!(matches!(err, GatewayError::Encode(_)));
        assert_eq!(err.class().status_code(), 500);
        assert_eq!(
            user_message_from_gateway(&err),
            "could not encode response: cannot encode"
        );
    }

    #[test]
    fn test_serve_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, settings) = setup(dir.path(), "question\na\nb\n");
        let input = "{\"op\":\"metadata\"}\n\n{\"op\":\"rows\"}\n";
        let mut output = Vec::new();

        let answered = serve(&gateway, &settings, input.as_bytes(), &mut output).unwrap();
        assert_eq!(answered, 2);

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["row_count"], 2);
        assert_eq!(lines[1]["rows"].as_array().unwrap().len(), 2);
    }
}
