use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::config::SyncSettings;
use crate::error::{ArchiveError, Result};
use crate::filename::date_folder;
use crate::index::MetadataIndex;
use crate::lister::{list_recordings, ListedObject};
use crate::store::RecordingStore;

/// Summary of one sync run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub indexed_count: usize,
    pub duration_seconds: f64,
    /// Date folders (`M_D_YYYY`) whose listing or indexing failed
    pub failed_days: Vec<String>,
}

/// Result of a sync attempt that does not wait for a running sync
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another sync was already in progress
    Skipped,
}

/// Keeps the metadata index in step with the recordings in the store.
///
/// Runs are serialized: on-demand syncs wait for the running one, the
/// periodic timer skips its tick instead.
pub struct SyncEngine {
    index: Arc<MetadataIndex>,
    store: Arc<RecordingStore>,
    settings: SyncSettings,
    run_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(index: Arc<MetadataIndex>, store: Arc<RecordingStore>, settings: SyncSettings) -> Self {
        Self {
            index,
            store,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    /// Index every date folder in the inclusive range `start..=end`.
    ///
    /// A day that fails is logged and reported in `failed_days`; the
    /// remaining days still run.
    pub async fn sync_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<SyncReport> {
        if start > end {
            return Err(ArchiveError::InvalidRequest(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        let guard = self.run_lock.lock().await;
        Ok(self.sync_date_range_locked(&guard, start, end).await)
    }

    /// Index the whole recordings root in batches
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let root = self.store.recordings_subprefix("");
        info!("[Sync] Full sync of '{}' started", root);

        let objects = list_recordings(self.store.inner().as_ref(), &root).await?;
        info!("[Sync] Found {} recordings", objects.len());

        let batch_size = self.settings.batch_size.max(1);
        let batch_count = objects.len().div_ceil(batch_size);
        let mut indexed_count = 0usize;

        for (idx, batch) in objects.chunks(batch_size).enumerate() {
            indexed_count += self
                .index
                .upsert_batch(batch, self.store.recordings_prefix())
                .await?;
            info!(
                "[Sync] Batch {}/{}: {} indexed so far",
                idx + 1,
                batch_count,
                indexed_count
            );
            if idx + 1 < batch_count && !self.settings.batch_pause().is_zero() {
                tokio::time::sleep(self.settings.batch_pause()).await;
            }
        }

        let report = SyncReport {
            indexed_count,
            duration_seconds: started.elapsed().as_secs_f64(),
            failed_days: Vec::new(),
        };
        info!(
            "[Sync] Full sync finished: {} files in {:.1}s",
            report.indexed_count, report.duration_seconds
        );
        Ok(report)
    }

    /// Index today's folder (local date)
    pub async fn sync_current_day(&self) -> Result<SyncReport> {
        let today = Local::now().date_naive();
        self.sync_date_range(today, today).await
    }

    /// Index today's folder unless another sync is running
    pub async fn try_sync_current_day(&self) -> SyncOutcome {
        let Ok(guard) = self.run_lock.try_lock() else {
            info!("[Sync] Another sync is in progress, skipping");
            return SyncOutcome::Skipped;
        };
        let today = Local::now().date_naive();
        SyncOutcome::Completed(self.sync_date_range_locked(&guard, today, today).await)
    }

    /// Run the current-day sync every `interval`, starting immediately
    pub fn spawn_periodic_sync(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!("[Sync] Periodic current-day sync every {}s", interval.as_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match self.try_sync_current_day().await {
                    SyncOutcome::Completed(report) if !report.failed_days.is_empty() => {
                        warn!("[Sync] Periodic sync failed for {:?}", report.failed_days);
                    }
                    SyncOutcome::Completed(report) => {
                        info!(
                            "[Sync] Periodic sync indexed {} files in {:.1}s",
                            report.indexed_count, report.duration_seconds
                        );
                    }
                    SyncOutcome::Skipped => {}
                }
            }
        })
    }

    async fn sync_date_range_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport::default();

        for day in start.iter_days().take_while(|d| *d <= end) {
            let folder = date_folder(day);
            match self.sync_day(&folder).await {
                Ok(count) => {
                    report.indexed_count += count;
                }
                Err(e) => {
                    error!("[Sync] Failed to sync {}: {}", folder, e);
                    report.failed_days.push(folder);
                }
            }
        }

        report.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            "[Sync] {}..{}: {} files indexed in {:.1}s ({} failed days)",
            start,
            end,
            report.indexed_count,
            report.duration_seconds,
            report.failed_days.len()
        );
        report
    }

    async fn sync_day(&self, folder: &str) -> Result<usize> {
        let prefix = self.store.recordings_subprefix(folder);
        let objects: Vec<ListedObject> = list_recordings(self.store.inner().as_ref(), &prefix).await?;
        let mut count = 0usize;
        for batch in objects.chunks(self.settings.batch_size.max(1)) {
            count += self
                .index
                .upsert_batch(batch, self.store.recordings_prefix())
                .await?;
        }
        Ok(count)
    }
}
