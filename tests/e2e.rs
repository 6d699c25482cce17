//! End-to-end tests for edgequake-tabconv.
//!
//! Most tests run the full pipeline against real workbooks (written with
//! rust_xlsxwriter) and stubbed PDF-text / model collaborators, so they need
//! neither pdfium nor network access.
//!
//! The live test at the bottom uses the real pdfium engine and a real LLM
//! provider. It is gated behind `E2E_ENABLED` and `TABCONV_SAMPLE_PDF`.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Live:
//!   E2E_ENABLED=1 TABCONV_SAMPLE_PDF=statement.pdf GEMINI_API_KEY=... \
//!     cargo test --test e2e live_ -- --nocapture

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use calamine::{open_workbook_auto, Reader};
use edgequake_tabconv::server::{router, ServerConfig};
use edgequake_tabconv::{
    ConvertError, Converter, ConverterConfig, ErrorBody, ExtractionClient, OutputFormat,
    TextExtractor, UploadedDocument,
};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct FixedText(&'static str);

#[async_trait]
impl TextExtractor for FixedText {
    async fn extract_text(&self, _path: &Path) -> Result<String, ConvertError> {
        Ok(self.0.to_string())
    }
}

struct FixedReply(&'static str);

#[async_trait]
impl ExtractionClient for FixedReply {
    async fn complete(&self, _prompt: &str) -> Result<String, ConvertError> {
        Ok(self.0.to_string())
    }
}

struct BrokenModel;

#[async_trait]
impl ExtractionClient for BrokenModel {
    async fn complete(&self, _prompt: &str) -> Result<String, ConvertError> {
        Err(ConvertError::ExternalExtraction {
            detail: "quota exceeded".into(),
        })
    }
}

const STATEMENT_REPLY: &str = "\
Date,Transaction ID,Sender/Receiver Name,Debit,Credit
2024-02-01,TX2,Bob,,200.00
pending,TX3,\"Carol, Inc.\",15.50,
2024-01-15,TX1,Alice,100.00,
";

fn converter(scratch: &Path, client: Arc<dyn ExtractionClient>) -> Converter {
    let config = ConverterConfig::builder()
        .scratch_dir(scratch)
        .build()
        .expect("valid config");
    Converter::new(config, Arc::new(FixedText("STATEMENT text")), client)
}

fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Write a one-sheet workbook; `None` cells are left blank.
fn workbook(path: &Path, rows: &[&[Option<&str>]]) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(v) = cell {
                match v.parse::<f64>() {
                    Ok(n) => ws.write_number(r as u32, c as u16, n).map(|_| ()),
                    Err(_) => ws.write_string(r as u32, c as u16, *v).map(|_| ()),
                }
                .unwrap();
            }
        }
    }
    wb.save(path).unwrap();
}

fn workbook_bytes(rows: &[&[Option<&str>]]) -> Vec<u8> {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("in.xlsx");
    workbook(&path, rows);
    std::fs::read(&path).unwrap()
}

fn read_xlsx(bytes: &[u8]) -> Vec<Vec<String>> {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("out.xlsx");
    std::fs::write(&path, bytes).unwrap();
    let mut wb = open_workbook_auto(&path).unwrap();
    assert_eq!(wb.sheet_names(), vec!["Sheet1".to_string()]);
    wb.worksheet_range("Sheet1")
        .unwrap()
        .rows()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn multipart(filename: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "tabconv-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn upload(uri: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let (content_type, body) = multipart(filename, bytes);
    Request::post(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

fn app(scratch: &Path, client: Arc<dyn ExtractionClient>) -> axum::Router {
    router(Arc::new(converter(scratch, client)), &ServerConfig::default())
}

// ── Library-level conversions ────────────────────────────────────────────────

#[tokio::test]
async fn spreadsheet_becomes_csv_in_input_order() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("report.xlsx");
    workbook(
        &input,
        &[
            &[Some("Name"), Some("Amount")],
            &[Some("Zed"), Some("20")],
            &[Some("Alice"), Some("10")],
        ],
    );

    let scratch = tmp.path().join("uploads");
    std::fs::create_dir(&scratch).unwrap();
    let conv = converter(&scratch, Arc::new(FixedReply("unused")));

    let artifact = conv
        .convert(UploadedDocument::new(&input, "report.xlsx"))
        .await
        .expect("conversion should succeed");
    assert_eq!(artifact.format(), OutputFormat::Csv);
    assert_eq!(artifact.download_name(), "report_converted.csv");
    assert_eq!(artifact.rows(), 2);

    let csv = String::from_utf8(artifact.into_bytes().await.unwrap()).unwrap();
    assert_eq!(csv, "Name,Amount\nZed,20\nAlice,10\n");

    assert!(!input.exists(), "input must be removed after success");
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn pdf_statement_becomes_sorted_xlsx() {
    let tmp = tempfile::tempdir().unwrap();
    let conv = converter(tmp.path(), Arc::new(FixedReply(STATEMENT_REPLY)));

    let artifact = conv
        .convert_bytes("jan statement.pdf", b"%PDF-1.7 stub", None)
        .await
        .expect("conversion should succeed");
    assert_eq!(artifact.format(), OutputFormat::Xlsx);
    assert_eq!(artifact.download_name(), "jan statement_converted.xlsx");
    assert_eq!(artifact.rows(), 3);

    let rows = read_xlsx(&artifact.into_bytes().await.unwrap());
    let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            s(&["Date", "Transaction ID", "Sender/Receiver Name", "Debit", "Credit"]),
            s(&["2024-01-15", "TX1", "Alice", "100.00", ""]),
            s(&["2024-02-01", "TX2", "Bob", "", "200.00"]),
            s(&["pending", "TX3", "Carol, Inc.", "15.50", ""]),
        ]
    );
    assert_eq!(scratch_entries(tmp.path()), 0);
}

#[tokio::test]
async fn format_override_turns_pdf_into_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let conv = converter(tmp.path(), Arc::new(FixedReply(STATEMENT_REPLY)));
    let artifact = conv
        .convert_bytes("s.pdf", b"%PDF", Some(OutputFormat::Csv))
        .await
        .unwrap();
    let csv = String::from_utf8(artifact.into_bytes().await.unwrap()).unwrap();
    assert!(csv.starts_with("Date,Transaction ID,Sender/Receiver Name,Debit,Credit\n2024-01-15,"));
    assert!(csv.ends_with("pending,TX3,\"Carol, Inc.\",15.50,\n"));
}

#[tokio::test]
async fn header_only_sheet_is_empty_input_and_input_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("empty.xlsx");
    workbook(&input, &[&[Some("Name"), Some("Amount")]]);

    let scratch = tmp.path().join("uploads");
    std::fs::create_dir(&scratch).unwrap();
    let conv = converter(&scratch, Arc::new(FixedReply("unused")));

    let err = conv
        .convert(UploadedDocument::new(&input, "empty.xlsx"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "EmptyInputError");
    assert_eq!(err.status(), 400);
    assert!(!input.exists(), "input must be removed after failure");
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn model_failure_is_500_and_leaves_nothing_behind() {
    let tmp = tempfile::tempdir().unwrap();
    let conv = converter(tmp.path(), Arc::new(BrokenModel));
    let err = conv.convert_bytes("s.pdf", b"%PDF", None).await.unwrap_err();
    assert_eq!(err.kind(), "ExternalExtractionError");
    assert_eq!(err.status(), 500);
    assert_eq!(scratch_entries(tmp.path()), 0);
}

#[tokio::test]
async fn wrong_schema_from_model_is_parse_error() {
    let tmp = tempfile::tempdir().unwrap();
    let conv = converter(tmp.path(), Arc::new(FixedReply("Date,Amount\n2024-01-01,5\n")));
    let err = conv.convert_bytes("s.pdf", b"%PDF", None).await.unwrap_err();
    assert_eq!(err.kind(), "ExtractionParseError");
    assert_eq!(scratch_entries(tmp.path()), 0);
}

#[tokio::test]
async fn corrupt_spreadsheet_is_read_error() {
    let tmp = tempfile::tempdir().unwrap();
    let conv = converter(tmp.path(), Arc::new(FixedReply("unused")));
    let err = conv
        .convert_bytes("broken.xlsx", b"definitely not a zip archive", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "SpreadsheetReadError");
    assert_eq!(scratch_entries(tmp.path()), 0);
}

// ── HTTP surface ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn http_liveness() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("/api/convert"));
}

#[tokio::test]
async fn http_spreadsheet_download() {
    let tmp = tempfile::tempdir().unwrap();
    let xlsx = workbook_bytes(&[
        &[Some("Name"), None, Some("Name")],
        &[Some("Alice"), Some("x"), Some("10")],
    ]);

    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(upload("/api/convert", "people.xlsx", &xlsx))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        OutputFormat::Csv.mime_type()
    );
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"people_converted.csv\""
    );
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Name,__EMPTY,Name_1\nAlice,x,10\n");
    assert_eq!(scratch_entries(tmp.path()), 0);
}

#[tokio::test]
async fn http_pdf_download_with_format_override() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply(STATEMENT_REPLY)))
        .oneshot(upload("/api/convert?format=xlsx", "s.pdf", b"%PDF-1.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        OutputFormat::Xlsx.mime_type()
    );
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let rows = read_xlsx(&body);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][0], "2024-01-15");
    assert_eq!(rows[3][0], "pending");
}

#[tokio::test]
async fn http_unsupported_type_is_400_json() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(upload("/api/convert", "notes.docx", b"PK\x03\x04"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.error, "Unsupported file type");
    assert_eq!(scratch_entries(tmp.path()), 0, "nothing may be written");
}

#[tokio::test]
async fn http_missing_file_field_is_400() {
    let tmp = tempfile::tempdir().unwrap();
    let boundary = "b";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--{boundary}--\r\n"
    );
    let req = Request::post("/api/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let parsed: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.error, "No file uploaded");
}

#[tokio::test]
async fn http_unknown_format_is_400() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(upload("/api/convert?format=docx", "a.xlsx", b"x"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_empty_post_is_json_no_file() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(Request::post("/api/convert").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.error, "No file uploaded");
    assert!(parsed.details.is_some());
}

#[tokio::test]
async fn http_repeated_format_is_json_400() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(upload("/api/convert?format=csv&format=xlsx", "a.xlsx", b"x"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.error, "Unsupported file type");
    assert!(parsed.details.unwrap().contains("format"));
    assert_eq!(scratch_entries(tmp.path()), 0);
}

#[tokio::test]
async fn http_model_failure_is_500_json() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(BrokenModel))
        .oneshot(upload("/api/convert", "s.pdf", b"%PDF-1.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.error, "Failed to process PDF data");
    assert!(parsed.details.unwrap().contains("quota"));
}

#[tokio::test]
async fn http_unknown_route_is_404_json() {
    let tmp = tempfile::tempdir().unwrap();
    let resp = app(tmp.path(), Arc::new(FixedReply("")))
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.error, "Route not found");
}

// ── Live pipeline (pdfium + real provider) ───────────────────────────────────

/// Skip unless E2E_ENABLED is set and TABCONV_SAMPLE_PDF names a file.
fn live_sample() -> Option<PathBuf> {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run live tests");
        return None;
    }
    let p = PathBuf::from(std::env::var("TABCONV_SAMPLE_PDF").ok()?);
    if !p.exists() {
        println!("SKIP: sample PDF not found: {}", p.display());
        return None;
    }
    Some(p)
}

#[tokio::test(flavor = "multi_thread")]
async fn live_statement_pdf_to_xlsx() {
    let Some(sample) = live_sample() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let config = ConverterConfig::builder()
        .scratch_dir(tmp.path())
        .build()
        .unwrap();
    let conv = Converter::from_config(config).expect("pdfium + provider available");

    let bytes = std::fs::read(&sample).unwrap();
    let name = sample.file_name().unwrap().to_string_lossy().to_string();
    let artifact = conv.convert_bytes(&name, &bytes, None).await.unwrap();
    println!("{} rows → {}", artifact.rows(), artifact.download_name());

    let rows = read_xlsx(&artifact.into_bytes().await.unwrap());
    assert_eq!(
        rows[0],
        vec!["Date", "Transaction ID", "Sender/Receiver Name", "Debit", "Credit"]
    );
    assert_eq!(scratch_entries(tmp.path()), 0);
}
