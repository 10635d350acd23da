use std::sync::Arc;
use std::time::Duration;

use common::ConversionStatus;
use common::config::SchedulerConfig;
use common::storage::{BlobRef, BlobStore, Checksum};
use converter::Converter;
use futures::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::models::{ContentSlot, FileRecord};
use crate::repository::FileRecordRepository;
use crate::service::slot_blob_info;

/// Counters for one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub selected: usize,
    pub converted: usize,
    pub not_supported: usize,
    pub not_needed: usize,
    /// Content blob absent or unreadable; the record is retried next tick.
    pub missing_content: usize,
    pub persist_failures: usize,
    /// Records changed by a concurrent save while being converted.
    pub stale: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// A previous tick was still running.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Updated(ConversionStatus),
    MissingContent,
    PersistFailed,
    Stale,
}

impl TickReport {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Updated(ConversionStatus::Converted) => self.converted += 1,
            RecordOutcome::Updated(ConversionStatus::NotSupported) => self.not_supported += 1,
            RecordOutcome::Updated(_) => self.not_needed += 1,
            RecordOutcome::MissingContent => self.missing_content += 1,
            RecordOutcome::PersistFailed => self.persist_failures += 1,
            RecordOutcome::Stale => self.stale += 1,
        }
    }
}

/// Periodically converts records waiting in `NotConverted` into PDF.
///
/// Only records in `NotConverted` are ever selected. A failure on one record
/// is logged and never affects the rest of the batch.
pub struct ConversionScheduler {
    repository: Arc<dyn FileRecordRepository>,
    blobs: Arc<dyn BlobStore>,
    converter: Arc<dyn Converter>,
    config: SchedulerConfig,
    running: Mutex<()>,
}

impl ConversionScheduler {
    pub fn new(
        repository: Arc<dyn FileRecordRepository>,
        blobs: Arc<dyn BlobStore>,
        converter: Arc<dyn Converter>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repository,
            blobs,
            converter,
            config,
            running: Mutex::new(()),
        }
    }

    /// Start the timer loop. It stops once `shutdown` is cancelled; a tick in
    /// progress always runs to completion.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(&self, shutdown: CancellationToken) {
        let period = Duration::from_millis(self.config.interval_ms.max(1));
        info!(
            interval_ms = self.config.interval_ms,
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            "Starting conversion scheduler"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.run_tick().await {
                        error!(error = %e, "Conversion tick failed");
                    }
                }
            }
        }

        info!("Conversion scheduler stopped");
    }

    /// Run one batch. Returns `Skipped` without touching anything when another
    /// tick holds the guard.
    #[instrument(skip(self))]
    pub async fn run_tick(&self) -> Result<TickOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous conversion tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };

        let batch = self
            .repository
            .find_by_status(ConversionStatus::NotConverted, self.config.batch_size)
            .await?;

        let mut report = TickReport {
            selected: batch.len(),
            ..TickReport::default()
        };
        if batch.is_empty() {
            return Ok(TickOutcome::Completed(report));
        }

        let outcomes: Vec<RecordOutcome> = stream::iter(batch)
            .map(|record| self.process(record))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        info!(
            selected = report.selected,
            converted = report.converted,
            not_supported = report.not_supported,
            not_needed = report.not_needed,
            missing_content = report.missing_content,
            persist_failures = report.persist_failures,
            stale = report.stale,
            "Conversion tick finished"
        );
        Ok(TickOutcome::Completed(report))
    }

    async fn process(&self, record: FileRecord) -> RecordOutcome {
        let id = record.id.unwrap_or_default();

        if self.config.skips_conversion(&record.mime_type) {
            return self
                .persist(&record, ConversionStatus::NotNeeded, None, record.checksum)
                .await;
        }

        let Some(content_ref) = record.content_ref else {
            error!(%id, "Stored file awaiting conversion has no content");
            return RecordOutcome::MissingContent;
        };
        let content = match self.blobs.get(&content_ref).await {
            Ok(content) => content,
            Err(e) => {
                error!(%id, blob = %content_ref, error = %e, "Failed to load content for conversion");
                return RecordOutcome::MissingContent;
            }
        };
        let checksum = record
            .checksum
            .unwrap_or_else(|| Checksum::compute(&content));

        match self.converter.convert(&content, &record.filename).await {
            Ok(pdf) => {
                let info = slot_blob_info(&record, id, ContentSlot::Converted);
                match self.blobs.put(&pdf, &info).await {
                    Ok(converted) => {
                        self.persist(
                            &record,
                            ConversionStatus::Converted,
                            Some(converted),
                            Some(checksum),
                        )
                        .await
                    }
                    Err(e) => {
                        error!(%id, error = %e, "Failed to store converted content");
                        RecordOutcome::PersistFailed
                    }
                }
            }
            Err(e) => {
                warn!(%id, filename = %record.filename, error = %e, "Conversion failed, marking not supported");
                self.persist(&record, ConversionStatus::NotSupported, None, Some(checksum))
                    .await
            }
        }
    }

    /// Write the outcome onto the current version of the record.
    ///
    /// The result is dropped when a save replaced the content in the
    /// meantime; the freshly written converted blob is removed with it. The
    /// write itself only lands on the version that passed those checks.
    async fn persist(
        &self,
        worked_on: &FileRecord,
        status: ConversionStatus,
        converted: Option<BlobRef>,
        checksum: Option<Checksum>,
    ) -> RecordOutcome {
        let id = worked_on.id.unwrap_or_default();

        let current = match self.repository.find_by_id(id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                info!(%id, "Stored file deleted during conversion");
                self.discard(converted).await;
                return RecordOutcome::Stale;
            }
            Err(e) => {
                error!(%id, error = %e, "Failed to reload stored file");
                self.discard(converted).await;
                return RecordOutcome::PersistFailed;
            }
        };

        if current.conversion_status != ConversionStatus::NotConverted
            || current.content_ref != worked_on.content_ref
            || current.checksum != worked_on.checksum
        {
            info!(%id, "Stored file changed during conversion, dropping result");
            self.discard(converted).await;
            return RecordOutcome::Stale;
        }

        let superseded = current
            .converted_content_ref
            .filter(|old| Some(*old) != converted);
        let expected_version = current.audit.version.unwrap_or(0);

        let mut updated = current;
        updated.conversion_status = status;
        updated.converted_content_ref = converted;
        if updated.checksum.is_none() && updated.content_ref.is_some() {
            updated.checksum = checksum;
        }

        match self
            .repository
            .save_if_version(updated, expected_version)
            .await
        {
            Ok(Some(_)) => {
                self.discard(superseded).await;
                RecordOutcome::Updated(status)
            }
            Ok(None) => {
                info!(%id, "Stored file changed while persisting conversion, dropping result");
                self.discard(converted).await;
                RecordOutcome::Stale
            }
            Err(e) => {
                error!(%id, error = %e, "Failed to persist conversion result");
                self.discard(converted).await;
                RecordOutcome::PersistFailed
            }
        }
    }

    async fn discard(&self, blob_ref: Option<BlobRef>) {
        let Some(blob_ref) = blob_ref else { return };
        if let Err(e) = self.blobs.delete(&blob_ref).await {
            warn!(blob = %blob_ref, error = %e, "Failed to delete unreferenced blob");
        }
    }
}
