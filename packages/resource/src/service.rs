//! Content lifecycle: checksum-driven dedup, conversion status transitions and
//! the blob slots behind each file record.

use std::sync::Arc;

use common::ConversionStatus;
use common::storage::{BlobInfo, BlobRef, BlobStore, Checksum, StorageError};
use converter::pdf_file_name;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{ContentError, Result};
use crate::models::{ContentSelector, ContentSlot, FileContent, FileRecord, LoadedFile};
use crate::repository::FileRecordRepository;

const RELATED_OBJECT_ATTRIBUTE: &str = "relatedObjectId";
const PDF_MIME_TYPE: &str = "application/pdf";

/// Outcome of a [`ResourceService::resave_all`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResaveReport {
    pub resaved: usize,
    /// Records without a resolvable content blob.
    pub skipped: usize,
    pub failed: usize,
}

/// The single place where blobs and file records are written together.
#[derive(Clone)]
pub struct ResourceService {
    repository: Arc<dyn FileRecordRepository>,
    blobs: Arc<dyn BlobStore>,
}

/// Which blobs a save has to write.
struct WritePlan<'a> {
    content: Option<&'a [u8]>,
    original: Option<&'a [u8]>,
    converted: Option<&'a [u8]>,
}

impl ResourceService {
    pub fn new(repository: Arc<dyn FileRecordRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repository, blobs }
    }

    pub fn repository(&self) -> &Arc<dyn FileRecordRepository> {
        &self.repository
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Persist `record` together with its payloads.
    ///
    /// Blob references, checksum and conversion status of an existing record
    /// are taken from the repository, never from the caller's copy. Every blob
    /// is written before the metadata commit; if any write fails the blobs
    /// written so far are removed and nothing is committed. Blobs superseded by
    /// this save are deleted once the commit succeeded. An existing record is
    /// only updated while it still has the version read at the start; a
    /// concurrent update or delete fails with [`ContentError::Conflict`].
    #[instrument(skip(self, record, content), fields(id = ?record.id, filename = %record.filename))]
    pub async fn save(&self, mut record: FileRecord, content: FileContent) -> Result<FileRecord> {
        let stored = match record.id {
            Some(id) => self.repository.find_by_id(id).await?,
            None => None,
        };
        let id = *record.id.get_or_insert_with(Uuid::now_v7);

        match &stored {
            Some(stored) => {
                record.content_ref = stored.content_ref;
                record.original_content_ref = stored.original_content_ref;
                record.converted_content_ref = stored.converted_content_ref;
                record.checksum = stored.checksum;
                record.conversion_status = stored.conversion_status;
            }
            None => {
                record.content_ref = None;
                record.original_content_ref = None;
                record.converted_content_ref = None;
                record.checksum = None;
            }
        }
        let previous = record.blob_refs();

        let bytes = content.content.as_deref().filter(|b| !b.is_empty());
        let write_content = match bytes {
            Some(bytes) => {
                let checksum = Checksum::compute(bytes);
                record.filesize = bytes.len() as i64;
                let changed = apply_checksum(&mut record, stored.is_none(), checksum);
                changed || record.content_ref.is_none()
            }
            None => {
                record.conversion_status = ConversionStatus::NotNeeded;
                record.checksum = None;
                record.content_ref = None;
                record.converted_content_ref = None;
                record.original_content_ref = None;
                false
            }
        };

        let plan = WritePlan {
            content: bytes.filter(|_| write_content),
            original: content
                .original
                .as_deref()
                .or(bytes.filter(|_| write_content)),
            converted: content
                .converted
                .as_deref()
                .filter(|_| record.conversion_status == ConversionStatus::Converted),
        };

        let written = self.write_blobs(&mut record, id, plan).await?;

        let committed = match &stored {
            Some(stored) => {
                let expected = stored.audit.version.unwrap_or(0);
                self.repository.save_if_version(record, expected).await
            }
            None => self.repository.save(record).await.map(Some),
        };
        let persisted = match committed {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                warn!("Stored file changed while saving, discarding written blobs");
                self.discard(&written).await;
                return Err(ContentError::Conflict(id));
            }
            Err(e) => {
                self.discard(&written).await;
                return Err(e.into());
            }
        };

        let live = persisted.blob_refs();
        let superseded: Vec<BlobRef> = previous
            .into_iter()
            .filter(|r| !live.contains(r))
            .collect();
        self.discard(&superseded).await;

        info!(
            status = %persisted.conversion_status,
            written = written.len(),
            superseded = superseded.len(),
            "Stored file saved"
        );
        Ok(persisted)
    }

    async fn write_blobs(
        &self,
        record: &mut FileRecord,
        id: Uuid,
        plan: WritePlan<'_>,
    ) -> Result<Vec<BlobRef>> {
        let slots = [
            (ContentSlot::Content, plan.content),
            (ContentSlot::Original, plan.original),
            (ContentSlot::Converted, plan.converted),
        ];

        let mut written = Vec::new();
        for (slot, data) in slots {
            let Some(data) = data else { continue };
            let info = slot_blob_info(record, id, slot);
            match self.blobs.put(data, &info).await {
                Ok(blob_ref) => {
                    written.push(blob_ref);
                    match slot {
                        ContentSlot::Content => record.content_ref = Some(blob_ref),
                        ContentSlot::Original => record.original_content_ref = Some(blob_ref),
                        ContentSlot::Converted => record.converted_content_ref = Some(blob_ref),
                    }
                }
                Err(e) => {
                    warn!(%slot, error = %e, "Blob write failed, aborting save");
                    self.discard(&written).await;
                    return Err(e.into());
                }
            }
        }
        Ok(written)
    }

    /// Best-effort removal of blobs no record points to.
    async fn discard(&self, refs: &[BlobRef]) {
        for blob_ref in refs {
            if let Err(e) = self.blobs.delete(blob_ref).await {
                warn!(blob = %blob_ref, error = %e, "Failed to delete unreferenced blob");
            }
        }
    }

    /// Load a record and the payloads `selector` asks for.
    ///
    /// A referenced blob that no longer exists is logged and returned as
    /// absent content.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid, selector: ContentSelector) -> Result<LoadedFile> {
        let record = self.find_existing(id).await?;

        let (content, original_content, converted_content) = match selector {
            ContentSelector::MetadataOnly => (None, None, None),
            ContentSelector::ConvertedOnly => {
                (None, None, self.load_slot(&record, ContentSlot::Converted).await?)
            }
            ContentSelector::Full => (
                self.load_slot(&record, ContentSlot::Content).await?,
                self.load_slot(&record, ContentSlot::Original).await?,
                self.load_slot(&record, ContentSlot::Converted).await?,
            ),
        };

        Ok(LoadedFile {
            record,
            content,
            original_content,
            converted_content,
        })
    }

    async fn load_slot(&self, record: &FileRecord, slot: ContentSlot) -> Result<Option<Vec<u8>>> {
        // A converted ref outside `Converted` is stale.
        if slot == ContentSlot::Converted
            && record.conversion_status != ConversionStatus::Converted
        {
            return Ok(None);
        }
        let Some(blob_ref) = record.slot_ref(slot) else {
            return Ok(None);
        };

        match self.blobs.get(&blob_ref).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => {
                warn!(
                    id = %record.id.unwrap_or_default(),
                    %slot,
                    blob = %blob_ref,
                    "Content blob missing"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every blob of the record, then the record itself.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let record = self.find_existing(id).await?;

        for blob_ref in record.blob_refs() {
            match self.blobs.delete(&blob_ref).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(blob = %blob_ref, "Blob already gone while deleting stored file");
                }
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.repository.delete_by_id(id).await?;
        info!("Stored file deleted");
        Ok(())
    }

    pub async fn find_any_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<Vec<FileRecord>> {
        Ok(self.repository.find_matching(filter, show_inactive).await?)
    }

    pub async fn count_any_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<u64> {
        Ok(self.repository.count_matching(filter, show_inactive).await?)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.repository.count().await?)
    }

    pub async fn find_all(&self) -> Result<Vec<FileRecord>> {
        Ok(self.repository.find_all().await?)
    }

    /// Run every stored record through `save` again with its own content.
    ///
    /// Fills in missing checksums and file sizes. Records whose content blob
    /// cannot be read are skipped; per-record failures never stop the sweep.
    #[instrument(skip(self))]
    pub async fn resave_all(&self) -> Result<ResaveReport> {
        let records = self.repository.find_all().await?;
        let mut report = ResaveReport::default();

        for record in records {
            let id = record.id.unwrap_or_default();
            match self.resave_one(record).await {
                Ok(true) => report.resaved += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(%id, error = %e, "Failed to re-save stored file");
                    report.failed += 1;
                }
            }
        }

        info!(
            resaved = report.resaved,
            skipped = report.skipped,
            failed = report.failed,
            "Re-save sweep finished"
        );
        Ok(report)
    }

    async fn resave_one(&self, record: FileRecord) -> Result<bool> {
        let Some(content) = self.load_slot(&record, ContentSlot::Content).await? else {
            return Ok(false);
        };

        // Without a checksum the content gets rewritten, and the original
        // slot with it unless carried over explicitly.
        let mut payload = FileContent::new(content);
        if record.checksum.is_none()
            && let Some(original) = self.load_slot(&record, ContentSlot::Original).await?
        {
            payload = payload.with_original(original);
        }

        self.save(record, payload).await?;
        Ok(true)
    }

    async fn find_existing(&self, id: Uuid) -> Result<FileRecord> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(ContentError::EntityNotFound(id))
    }
}

/// Name, mime type and attributes of the blob stored in `slot` of a record.
pub(crate) fn slot_blob_info(record: &FileRecord, id: Uuid, slot: ContentSlot) -> BlobInfo {
    let info = match slot {
        ContentSlot::Content => {
            BlobInfo::new(format!("{id}-{}", record.filename), &record.mime_type)
        }
        ContentSlot::Original => {
            BlobInfo::new(format!("{id}-o-{}", record.filename), &record.mime_type)
        }
        ContentSlot::Converted => BlobInfo::new(
            format!("{id}-{}", pdf_file_name(&record.filename)),
            PDF_MIME_TYPE,
        ),
    };
    info.with_attribute(RELATED_OBJECT_ATTRIBUTE, id.to_string())
}

/// Apply a freshly computed checksum to `record`. Returns whether the content
/// differs from what is stored.
///
/// Status is reset to `NotConverted` for new records and for content whose
/// checksum differs from the stored one. A record that never had a checksum
/// adopts it with its status untouched.
fn apply_checksum(record: &mut FileRecord, is_new: bool, checksum: Checksum) -> bool {
    let changed = if is_new {
        record.conversion_status = ConversionStatus::NotConverted;
        true
    } else {
        match record.checksum {
            None => true,
            Some(stored) if stored != checksum => {
                record.conversion_status = ConversionStatus::NotConverted;
                record.converted_content_ref = None;
                true
            }
            Some(_) => false,
        }
    };
    record.checksum = Some(checksum);
    changed
}
