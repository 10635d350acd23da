use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::ConversionStatus;
use common::storage::{BlobStore, Checksum};
use converter::{ConversionError, Converter, ProcessConverter};
use resource::{ContentSelector, FileContent, FileRecordRepository, TickOutcome, TickReport};
use tempfile::TempDir;

use crate::support::TestApp;

/// Behaves like the office renderer for everything but plain text, which it
/// refuses with a non-zero exit.
const FAKE_SOFFICE: &str = r#"#!/bin/sh
[ "$1" = "--convert-to" ] && [ "$2" = "pdf" ] && [ "$3" = "--outdir" ] || exit 3
case "$5" in
  *.txt) echo "Error: source file could not be loaded" >&2; exit 1 ;;
esac
stem=$(basename "${5%.*}")
{ printf '%%PDF-'; cat "$5"; } > "$4/$stem.pdf"
"#;

struct Counting {
    inner: ProcessConverter,
    calls: AtomicUsize,
    _bin: TempDir,
}

#[async_trait]
impl Converter for Counting {
    async fn convert(
        &self,
        input: &[u8],
        original_filename: &str,
    ) -> Result<Vec<u8>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.convert(input, original_filename).await
    }
}

impl Counting {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fake_soffice() -> Arc<Counting> {
    let bin = tempfile::tempdir().unwrap();
    let path = bin.path().join("soffice");
    std::fs::write(&path, FAKE_SOFFICE).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    Arc::new(Counting {
        inner: ProcessConverter::new(path_string(&path), Duration::from_secs(10)),
        calls: AtomicUsize::new(0),
        _bin: bin,
    })
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn completed(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Completed(report) => report,
        TickOutcome::Skipped => panic!("tick was skipped"),
    }
}

#[tokio::test]
async fn office_document_is_converted() {
    let app = TestApp::spawn().await;
    let converter = fake_soffice();
    let scheduler = app.scheduler(converter.clone());

    let saved = app
        .save_new("report.docx", "application/msword", b"minutes")
        .await;
    assert_eq!(saved.conversion_status, ConversionStatus::NotConverted);
    assert_eq!(saved.checksum, Some(Checksum::compute(b"minutes")));

    let report = completed(scheduler.run_tick().await.unwrap());
    assert_eq!(report.converted, 1);

    let id = saved.id.unwrap();
    let stored = app.stored(id).await;
    assert_eq!(stored.conversion_status, ConversionStatus::Converted);
    assert_eq!(stored.content_ref, saved.content_ref);
    assert_eq!(stored.original_content_ref, saved.original_content_ref);

    let converted_ref = stored.converted_content_ref.unwrap();
    let stat = app.blobs.stat(&converted_ref).await.unwrap();
    assert_eq!(stat.info.name, format!("{id}-report.pdf"));
    assert_eq!(stat.info.mime_type, "application/pdf");

    let loaded = app
        .service
        .get_by_id(id, ContentSelector::ConvertedOnly)
        .await
        .unwrap();
    assert_eq!(loaded.converted_content.as_deref(), Some(&b"%PDF-minutes"[..]));
    assert_eq!(loaded.content, None);

    let full = app.service.get_by_id(id, ContentSelector::Full).await.unwrap();
    assert_eq!(full.content.as_deref(), Some(&b"minutes"[..]));
    assert_eq!(converter.calls(), 1);
}

#[tokio::test]
async fn image_needs_no_conversion() {
    let app = TestApp::spawn().await;
    let converter = fake_soffice();
    let scheduler = app.scheduler(converter.clone());

    let photo = app.save_new("photo.png", "image/png", b"\x89PNG").await;
    let pdf = app
        .save_new("scan.pdf", "application/pdf", b"%PDF-1.7")
        .await;

    let report = completed(scheduler.run_tick().await.unwrap());
    assert_eq!(report.not_needed, 2);
    assert_eq!(converter.calls(), 0);

    let photo = app.stored(photo.id.unwrap()).await;
    assert_eq!(photo.conversion_status, ConversionStatus::NotNeeded);
    assert_eq!(photo.converted_content_ref, None);
    assert_eq!(
        app.stored(pdf.id.unwrap()).await.conversion_status,
        ConversionStatus::NotNeeded
    );

    // Settled records are no longer selected.
    let version = photo.audit.version;
    let report = completed(scheduler.run_tick().await.unwrap());
    assert_eq!(report.selected, 0);
    assert_eq!(app.stored(photo.id.unwrap()).await.audit.version, version);
}

#[tokio::test]
async fn new_content_reverts_to_not_converted() {
    let app = TestApp::spawn().await;
    let converter = fake_soffice();
    let scheduler = app.scheduler(converter.clone());

    let saved = app
        .save_new("report.docx", "application/msword", b"draft")
        .await;
    completed(scheduler.run_tick().await.unwrap());
    let converted = app.stored(saved.id.unwrap()).await;
    let old_pdf = converted.converted_content_ref.unwrap();

    let resaved = app
        .service
        .save(converted.clone(), FileContent::new(b"final".to_vec()))
        .await
        .unwrap();

    assert_ne!(resaved.checksum, converted.checksum);
    assert_eq!(resaved.conversion_status, ConversionStatus::NotConverted);
    assert_eq!(resaved.converted_content_ref, None);
    assert!(!app.blobs.exists(&old_pdf).await.unwrap());

    completed(scheduler.run_tick().await.unwrap());
    let reconverted = app.stored(saved.id.unwrap()).await;
    assert_eq!(reconverted.conversion_status, ConversionStatus::Converted);
    assert_eq!(
        app.blobs
            .get(&reconverted.converted_content_ref.unwrap())
            .await
            .unwrap(),
        b"%PDF-final"
    );
}

#[tokio::test]
async fn failed_conversion_is_terminal_until_content_changes() {
    let app = TestApp::spawn().await;
    let converter = fake_soffice();
    let scheduler = app.scheduler(converter.clone());

    let saved = app.save_new("notes.txt", "text/plain", b"todo").await;
    let id = saved.id.unwrap();

    let report = completed(scheduler.run_tick().await.unwrap());
    assert_eq!(report.not_supported, 1);
    assert_eq!(
        app.stored(id).await.conversion_status,
        ConversionStatus::NotSupported
    );

    for _ in 0..3 {
        let report = completed(scheduler.run_tick().await.unwrap());
        assert_eq!(report.selected, 0);
    }
    assert_eq!(converter.calls(), 1);

    // Same bytes again: still terminal.
    let resaved = app
        .service
        .save(app.stored(id).await, FileContent::new(b"todo".to_vec()))
        .await
        .unwrap();
    assert_eq!(resaved.conversion_status, ConversionStatus::NotSupported);

    let mut renamed = resaved;
    renamed.filename = "notes.md".into();
    let changed = app
        .service
        .save(renamed, FileContent::new(b"done".to_vec()))
        .await
        .unwrap();
    assert_eq!(changed.conversion_status, ConversionStatus::NotConverted);

    completed(scheduler.run_tick().await.unwrap());
    assert_eq!(
        app.stored(id).await.conversion_status,
        ConversionStatus::Converted
    );
    assert_eq!(converter.calls(), 2);
}

#[tokio::test]
async fn settled_records_are_never_touched() {
    let app = TestApp::spawn().await;
    let converter = fake_soffice();
    let scheduler = app.scheduler(converter.clone());

    let mut settled = Vec::new();
    for status in [
        ConversionStatus::Converted,
        ConversionStatus::NotSupported,
        ConversionStatus::NotNeeded,
    ] {
        let saved = app
            .save_new("report.docx", "application/msword", status.as_str().as_bytes())
            .await;
        let mut stored = app.stored(saved.id.unwrap()).await;
        stored.conversion_status = status;
        settled.push(app.repo.save(stored).await.unwrap());
    }

    let report = completed(scheduler.run_tick().await.unwrap());
    assert_eq!(report.selected, 0);
    assert_eq!(converter.calls(), 0);
    for before in settled {
        let after = app.stored(before.id.unwrap()).await;
        assert_eq!(after, before);
    }
}
