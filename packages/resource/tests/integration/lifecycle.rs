use common::ConversionStatus;
use common::storage::{BlobInfo, BlobRef, BlobStore, Checksum};
use resource::{
    ContentError, ContentSelector, ErrorKind, FileContent, FileRecord, FileRecordRepository,
};

use crate::support::TestApp;

mod save {
    use super::*;

    #[tokio::test]
    async fn identical_content_twice_changes_nothing() {
        let app = TestApp::spawn().await;
        let first = app
            .save_new("report.docx", "application/msword", b"quarterly numbers")
            .await;

        let second = app
            .service
            .save(first.clone(), FileContent::new(b"quarterly numbers".to_vec()))
            .await
            .unwrap();

        assert_eq!(second.checksum, first.checksum);
        assert_eq!(second.conversion_status, first.conversion_status);
        assert_eq!(second.content_ref, first.content_ref);
    }

    #[tokio::test]
    async fn identical_content_keeps_conversion() {
        let app = TestApp::spawn().await;
        let saved = app
            .save_new("report.docx", "application/msword", b"v1")
            .await;
        let id = saved.id.unwrap();

        let converted = app
            .blobs
            .put(b"%PDF-v1", &BlobInfo::new("report.pdf", "application/pdf"))
            .await
            .unwrap();
        let mut stored = app.stored(id).await;
        stored.conversion_status = ConversionStatus::Converted;
        stored.converted_content_ref = Some(converted);
        app.repo.save(stored.clone()).await.unwrap();

        let resaved = app
            .service
            .save(stored, FileContent::new(b"v1".to_vec()))
            .await
            .unwrap();

        assert_eq!(resaved.conversion_status, ConversionStatus::Converted);
        assert_eq!(resaved.converted_content_ref, Some(converted));
        assert!(app.blobs.exists(&converted).await.unwrap());
    }

    #[tokio::test]
    async fn different_content_resets_conversion() {
        let app = TestApp::spawn().await;
        let saved = app
            .save_new("report.docx", "application/msword", b"v1")
            .await;
        let id = saved.id.unwrap();

        let converted = app
            .blobs
            .put(b"%PDF-v1", &BlobInfo::new("report.pdf", "application/pdf"))
            .await
            .unwrap();
        let mut stored = app.stored(id).await;
        stored.conversion_status = ConversionStatus::Converted;
        stored.converted_content_ref = Some(converted);
        app.repo.save(stored.clone()).await.unwrap();

        let resaved = app
            .service
            .save(stored, FileContent::new(b"v2".to_vec()))
            .await
            .unwrap();

        assert_eq!(resaved.conversion_status, ConversionStatus::NotConverted);
        assert_eq!(resaved.converted_content_ref, None);
        assert_eq!(resaved.checksum, Some(Checksum::compute(b"v2")));
        assert_ne!(resaved.content_ref, saved.content_ref);
        // Superseded blobs are gone, the new ones are readable.
        assert!(!app.blobs.exists(&converted).await.unwrap());
        assert!(!app.blobs.exists(&saved.content_ref.unwrap()).await.unwrap());
        assert_eq!(
            app.blobs.get(&resaved.content_ref.unwrap()).await.unwrap(),
            b"v2"
        );
    }

    #[tokio::test]
    async fn no_content_means_not_needed() {
        let app = TestApp::spawn().await;
        let saved = app
            .service
            .save(FileRecord::new("notes.txt", "text/plain"), FileContent::none())
            .await
            .unwrap();

        assert!(saved.id.is_some());
        assert_eq!(saved.conversion_status, ConversionStatus::NotNeeded);
        assert_eq!(saved.checksum, None);
        assert_eq!(saved.content_ref, None);
        assert!(saved.blob_refs().is_empty());
    }

    #[tokio::test]
    async fn empty_content_counts_as_none() {
        let app = TestApp::spawn().await;
        let saved = app
            .service
            .save(
                FileRecord::new("notes.txt", "text/plain"),
                FileContent::new(Vec::new()),
            )
            .await
            .unwrap();

        assert_eq!(saved.conversion_status, ConversionStatus::NotNeeded);
        assert_eq!(saved.content_ref, None);
    }

    #[tokio::test]
    async fn dropping_content_clears_slots() {
        let app = TestApp::spawn().await;
        let saved = app
            .save_new("report.docx", "application/msword", b"v1")
            .await;
        let old_refs = saved.blob_refs();

        let cleared = app
            .service
            .save(saved, FileContent::none())
            .await
            .unwrap();

        assert_eq!(cleared.conversion_status, ConversionStatus::NotNeeded);
        assert_eq!(cleared.checksum, None);
        assert!(cleared.blob_refs().is_empty());
        for blob_ref in old_refs {
            assert!(!app.blobs.exists(&blob_ref).await.unwrap());
        }
    }

    #[tokio::test]
    async fn unknown_id_is_inserted_as_given() {
        let app = TestApp::spawn().await;
        let mut record = FileRecord::new("report.docx", "application/msword");
        let id = uuid::Uuid::now_v7();
        record.id = Some(id);
        record.content_ref = Some(BlobRef::generate());

        let saved = app
            .service
            .save(record, FileContent::new(b"body".to_vec()))
            .await
            .unwrap();

        assert_eq!(saved.id, Some(id));
        assert_eq!(saved.conversion_status, ConversionStatus::NotConverted);
        assert_eq!(app.blobs_present(&saved).await, vec![true, true]);
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let app = TestApp::spawn().await;
        let record = FileRecord::new("contract.odt", "application/vnd.oasis.opendocument.text")
            .with_metadata("customer", "ACME")
            .related_to("Contract", "C-17");

        let saved = app
            .service
            .save(record, FileContent::new(b"terms".to_vec()))
            .await
            .unwrap();
        let loaded = app
            .service
            .get_by_id(saved.id.unwrap(), ContentSelector::MetadataOnly)
            .await
            .unwrap();

        assert_eq!(
            loaded.record.metadata.get("customer").map(String::as_str),
            Some("ACME")
        );
        assert_eq!(loaded.record.related_object_class.as_deref(), Some("Contract"));
        assert_eq!(loaded.record.filesize, 5);
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn full_selector_returns_every_payload() {
        let app = TestApp::spawn().await;
        let saved = app
            .service
            .save(
                FileRecord::new("scan.tiff", "image/tiff"),
                FileContent::new(b"working".to_vec()).with_original(b"raw scan".to_vec()),
            )
            .await
            .unwrap();

        let loaded = app
            .service
            .get_by_id(saved.id.unwrap(), ContentSelector::Full)
            .await
            .unwrap();
        assert_eq!(loaded.content.as_deref(), Some(&b"working"[..]));
        assert_eq!(loaded.original_content.as_deref(), Some(&b"raw scan"[..]));
        assert_eq!(loaded.converted_content, None);
    }

    #[tokio::test]
    async fn missing_blob_is_absent_not_fatal() {
        let app = TestApp::spawn().await;
        let saved = app
            .save_new("report.docx", "application/msword", b"body")
            .await;
        app.blobs
            .delete(&saved.original_content_ref.unwrap())
            .await
            .unwrap();

        let loaded = app
            .service
            .get_by_id(saved.id.unwrap(), ContentSelector::Full)
            .await
            .unwrap();
        assert_eq!(loaded.content.as_deref(), Some(&b"body"[..]));
        assert_eq!(loaded.original_content, None);
    }

    #[tokio::test]
    async fn unknown_id_is_entity_not_found() {
        let app = TestApp::spawn().await;
        let err = app
            .service
            .get_by_id(uuid::Uuid::now_v7(), ContentSelector::Full)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityNotFound);
    }

    #[tokio::test]
    async fn listing_and_counting() {
        let app = TestApp::spawn().await;
        app.save_new("invoice-1.docx", "application/msword", b"1")
            .await;
        app.save_new("invoice-2.docx", "application/msword", b"2")
            .await;
        let mut hidden = FileRecord::new("invoice-3.docx", "application/msword");
        hidden.is_active = false;
        app.service
            .save(hidden, FileContent::new(b"3".to_vec()))
            .await
            .unwrap();
        app.save_new("photo.png", "image/png", b"4").await;

        assert_eq!(app.service.count().await.unwrap(), 4);
        assert_eq!(
            app.service
                .count_any_matching(Some("invoice"), false)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            app.service
                .find_any_matching(Some("invoice"), true)
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(app.service.find_all().await.unwrap().len(), 4);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn removes_every_slot_and_the_record() {
        let app = TestApp::spawn().await;
        let saved = app
            .save_new("report.docx", "application/msword", b"body")
            .await;
        let id = saved.id.unwrap();

        let converted = app
            .blobs
            .put(b"%PDF", &BlobInfo::new("report.pdf", "application/pdf"))
            .await
            .unwrap();
        let mut stored = app.stored(id).await;
        stored.conversion_status = ConversionStatus::Converted;
        stored.converted_content_ref = Some(converted);
        let stored = app.repo.save(stored).await.unwrap();
        assert_eq!(app.blobs_present(&stored).await, vec![true, true, true]);

        app.service.delete(id).await.unwrap();

        for blob_ref in stored.blob_refs() {
            let err = app.blobs.get(&blob_ref).await.unwrap_err();
            assert!(err.is_not_found());
        }
        assert!(app.repo.find_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn already_missing_blob_is_ignored() {
        let app = TestApp::spawn().await;
        let saved = app
            .save_new("report.docx", "application/msword", b"body")
            .await;
        app.blobs.delete(&saved.content_ref.unwrap()).await.unwrap();

        app.service.delete(saved.id.unwrap()).await.unwrap();

        let err = app
            .service
            .get_by_id(saved.id.unwrap(), ContentSelector::MetadataOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_id_is_entity_not_found() {
        let app = TestApp::spawn().await;
        let err = app.service.delete(uuid::Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityNotFound);
    }
}
