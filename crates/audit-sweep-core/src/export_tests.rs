//! Tests for CSV export.

use super::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn event(actor: &str, extra: &[(&str, &str)]) -> NormalizedEvent {
    NormalizedEvent {
        record_id: None,
        timestamp: Timestamp::from_rfc3339("2024-06-01T10:15:00Z").unwrap(),
        actor: actor.to_string(),
        operation: "FileDeleted".to_string(),
        record_type: "SharePointFileOperation".to_string(),
        workload: "SharePoint".to_string(),
        object_id: "https://contoso.sharepoint.com/sites/hr/doc.docx".to_string(),
        client_ip: "10.0.0.1".to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        extra_fields: extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_default_export_path_embeds_timestamp() {
    let now = Timestamp::from_rfc3339("2024-03-05T07:08:09Z").unwrap();

    let path = default_export_path(Path::new("/reports"), "FileDeletions", now);

    assert_eq!(
        path,
        PathBuf::from("/reports/FileDeletions_2024-03-05_07-08-09.csv")
    );
}

#[test]
fn test_headers_follow_profile() {
    let search = CsvExportSink::new(ReportProfile::Search).headers();
    assert_eq!(&search[..8], &BASE_COLUMNS[..]);
    assert_eq!(search.last(), Some(&AUDIT_DATA_COLUMN));

    let deletions = CsvExportSink::new(ReportProfile::FileDeletion).headers();
    assert!(deletions.contains(&"SiteUrl"));
    assert!(deletions.contains(&"SourceFileName"));
    assert!(!deletions.contains(&AUDIT_DATA_COLUMN));
}

#[tokio::test]
async fn test_export_writes_profile_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deletions.csv");
    let sink = CsvExportSink::new(ReportProfile::FileDeletion);
    let events = vec![
        event(
            "alice@contoso.com",
            &[("SiteUrl", "https://contoso.sharepoint.com/sites/hr/"), ("SourceFileName", "doc.docx")],
        ),
        event("bob@contoso.com", &[]),
    ];

    let summary = sink.export(&events, &path).await.unwrap();

    assert!(summary.written);
    assert_eq!(summary.rows, 2);
    let rows = read_rows(&path);
    assert_eq!(rows.len(), 3);
    let header = &rows[0];
    let site = header.iter().position(|h| h == "SiteUrl").unwrap();
    let file = header.iter().position(|h| h == "SourceFileName").unwrap();
    assert_eq!(rows[1][0], "2024-06-01T10:15:00Z");
    assert_eq!(rows[1][1], "alice@contoso.com");
    assert_eq!(rows[1][site], "https://contoso.sharepoint.com/sites/hr/");
    assert_eq!(rows[1][file], "doc.docx");
    assert_eq!(rows[2][site], "");
}

#[tokio::test]
async fn test_search_export_carries_audit_data_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("search.csv");
    let sink = CsvExportSink::new(ReportProfile::Search);
    let events = vec![event("alice@contoso.com", &[("Parameters.ForwardTo", "eve@evil.example")])];

    sink.export(&events, &path).await.unwrap();

    let rows = read_rows(&path);
    let audit_data: serde_json::Value = serde_json::from_str(rows[1].last().unwrap()).unwrap();
    assert_eq!(audit_data["Parameters.ForwardTo"], "eve@evil.example");
}

#[tokio::test]
async fn test_empty_result_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.csv");

    let summary = CsvExportSink::new(ReportProfile::LicenseChange)
        .export(&[], &path)
        .await
        .unwrap();

    assert!(!summary.written);
    assert_eq!(summary.rows, 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unwritable_target_is_io_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let path = blocker.join("report.csv");

    let err = CsvExportSink::new(ReportProfile::Search)
        .export(&[event("alice", &[])], &path)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Io { .. }));
}

#[test]
fn test_render_quotes_embedded_separators() {
    let sink = CsvExportSink::new(ReportProfile::Search);
    let mut e = event("alice", &[]);
    e.user_agent = "Agent, with \"quotes\"".to_string();

    let bytes = sink.render(&[e]).unwrap();
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.contains("\"Agent, with \"\"quotes\"\"\""));
}
