//! Import job: the unit of work handed to the task runner
//!
//! Owns the batch of staged file names and the overall status. Runs
//! synchronously on the calling execution context, to completion: no
//! internal parallelism and no mid-batch cancellation point. External
//! scheduling must serialize jobs against one store.

use crate::{ImportBatch, ImportConfig, ImportError, ReconciliationEngine};
use commerceml_catalog::{CatalogStore, ProgressSink};
use commerceml_xmltree::parse_normalized;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

/// Lifecycle of an import job.
///
/// `Failed` exists for the task runner's sake but the import path never
/// reaches it: phase failures bubble as errors and the status stays
/// `Running` for the runner to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One import invocation over a list of uploaded feed files.
#[derive(Debug)]
pub struct ImportJob {
    files: Vec<String>,
    batch: ImportBatch,
    status: JobStatus,
}

impl ImportJob {
    /// Job over the given display names, as drained from the exchange
    /// session's staging list.
    pub fn new(files: Vec<String>) -> Self {
        Self {
            files,
            batch: ImportBatch::new(),
            status: JobStatus::Pending,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn batch(&self) -> &ImportBatch {
        &self.batch
    }

    /// Stage every readable, parseable file oldest-first, then reconcile.
    ///
    /// A file that cannot be read or parsed is logged and skipped; it never
    /// fails the job. The job always ends `Done` when reconciliation
    /// returns, including the silent no-op of an incomplete batch.
    pub fn execute<S, P>(
        &mut self,
        store: &mut S,
        progress: &mut P,
        config: ImportConfig,
    ) -> Result<(), ImportError>
    where
        S: CatalogStore,
        P: ProgressSink,
    {
        self.status = JobStatus::Running;
        info!(files = self.files.len(), "starting feed import");

        let stored = store.files_by_names(&self.files);
        let total = stored.len();
        for (index, file) in stored.iter().enumerate() {
            match fs::read_to_string(&file.path) {
                Ok(xml) => match parse_normalized(&xml) {
                    Ok(tree) => self.batch.stage(&tree),
                    Err(err) => {
                        warn!(file = %file.name, error = %err, "skipping unparseable feed file");
                    }
                },
                Err(err) => {
                    warn!(file = %file.name, error = %err, "skipping unreadable feed file");
                }
            }
            progress.report(index, total);
        }

        ReconciliationEngine::new(store, progress, config).run(&mut self.batch)?;

        self.status = JobStatus::Done;
        info!(
            categories = self.batch.categories.len(),
            properties = self.batch.properties.len(),
            products = self.batch.products.len(),
            "feed import finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use commerceml_catalog::{MemoryCatalog, NullProgress};
    use std::io::Write;

    #[test]
    fn test_unparseable_file_does_not_fail_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.xml");
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "<broken").unwrap();

        let mut store = MemoryCatalog::new();
        store.add_file("import", &path, Utc::now());

        let mut job = ImportJob::new(vec!["import".to_string()]);
        job.execute(&mut store, &mut NullProgress, ImportConfig::default())
            .unwrap();

        assert_eq!(job.status(), JobStatus::Done);
        assert!(job.batch().categories.is_empty());
    }

    #[test]
    fn test_missing_file_on_disk_is_skipped() {
        let mut store = MemoryCatalog::new();
        store.add_file("gone", "/nonexistent/gone.xml", Utc::now());

        let mut job = ImportJob::new(vec!["gone".to_string()]);
        job.execute(&mut store, &mut NullProgress, ImportConfig::default())
            .unwrap();

        assert_eq!(job.status(), JobStatus::Done);
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = ImportJob::new(vec![]);
        assert_eq!(job.status(), JobStatus::Pending);
    }
}
