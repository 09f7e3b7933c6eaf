//! Deletes payment receipts once they are older than the retention window.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use super::{ImageStore, UploadError, RECEIPTS_BUCKET};

#[derive(Clone, Debug)]
pub struct CleanupPolicy {
    pub bucket: String,
    pub max_age: Duration,
    pub page_size: usize,
    pub batch_size: usize,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self { bucket: RECEIPTS_BUCKET.to_string(), max_age: Duration::days(1), page_size: 1000, batch_size: 100 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub deleted_files: Vec<String>,
}

/// Lists the bucket oldest-first, collects files created before `now - max_age`,
/// then deletes them in batches.
///
/// Listing stops at a short page, or at a full page whose last file is already
/// inside the retention window.
pub async fn cleanup_old_receipts<I: ImageStore>(
    store: &I,
    policy: &CleanupPolicy,
    now: DateTime<Utc>,
) -> Result<CleanupReport, UploadError> {
    let cutoff = now - policy.max_age;
    let page_size = policy.page_size.max(1);
    let mut expired: Vec<String> = Vec::new();
    let mut offset = 0;

    loop {
        let page = store.list(&policy.bucket, offset, page_size).await?;
        let Some(last) = page.last() else { break };
        let page_full = page.len() == page_size;
        let last_is_old = last.created_at < cutoff;
        expired.extend(page.into_iter().filter(|f| f.created_at < cutoff).map(|f| f.name));
        if !page_full || !last_is_old {
            break;
        }
        offset += page_size;
    }

    if expired.is_empty() {
        tracing::info!(bucket = %policy.bucket, "no old receipts to delete");
        return Ok(CleanupReport::default());
    }

    let mut report = CleanupReport::default();
    for batch in expired.chunks(policy.batch_size.max(1)) {
        store.remove(&policy.bucket, batch).await?;
        report.deleted_count += batch.len();
        report.deleted_files.extend_from_slice(batch);
    }
    tracing::info!(bucket = %policy.bucket, deleted = report.deleted_count, "old receipts deleted");
    Ok(report)
}
