//! Report run tracking
//!
//! One report request becomes one tracked run: triggered, computed on the
//! blocking pool, and finished in a terminal Complete or Failed state.
//! Status lives in a process-wide map keyed by run id; only the run itself
//! mutates its entry. Failed runs are not retried - the caller triggers a
//! new run instead.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::dataset::Dataset;
use crate::report;

/// Lifecycle of one report run. Complete and Failed are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Complete { path: PathBuf },
    Failed,
}

/// Process-wide run tracker. Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ReportJobs {
    runs: Arc<RwLock<HashMap<String, JobStatus>>>,
}

fn new_run_id() -> String {
    let mut rng = rand::thread_rng();
    let hi: u64 = rng.gen();
    let lo: u64 = rng.gen();
    format!("{:016x}{:016x}", hi, lo)
}

impl ReportJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status of a run, or None for an unknown run id.
    pub fn status(&self, run_id: &str) -> Option<JobStatus> {
        self.runs
            .read()
            .ok()
            .and_then(|runs| runs.get(run_id).cloned())
    }

    fn set_status(&self, run_id: &str, status: JobStatus) {
        if let Ok(mut runs) = self.runs.write() {
            runs.insert(run_id.to_string(), status);
        }
    }

    /// Trigger one report run. Returns the run id immediately; the report
    /// is computed in the background and lands in the reports directory as
    /// `<run_id>.csv` before the status flips to Complete.
    ///
    /// `now_override` fixes the reference instant; otherwise it is derived
    /// from the most recent observation in the dataset.
    pub fn trigger(
        &self,
        dataset: Arc<Dataset>,
        reports_dir: PathBuf,
        now_override: Option<DateTime<Utc>>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let now = match now_override {
            Some(instant) => instant,
            None => dataset
                .latest_timestamp()
                .context("no observations loaded; cannot derive report reference time")?,
        };

        let run_id = new_run_id();
        self.set_status(&run_id, JobStatus::Running);
        info!("Report run {} triggered (reference time {})", run_id, now);

        let jobs = self.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            let task_id = id.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                run_report(&dataset, now, &reports_dir, &task_id, &cancel)
            })
            .await;

            match outcome {
                Ok(Ok(path)) => {
                    info!("Report run {} complete: {}", id, path.display());
                    jobs.set_status(&id, JobStatus::Complete { path });
                }
                Ok(Err(e)) => {
                    error!("Report run {} failed: {:#}", id, e);
                    jobs.set_status(&id, JobStatus::Failed);
                }
                Err(e) => {
                    error!("Report run {} task panicked: {}", id, e);
                    jobs.set_status(&id, JobStatus::Failed);
                }
            }
        });

        Ok(run_id)
    }
}

/// Compute every store's row and write the CSV artifact. Cancellation is
/// checked between stores; a cancelled run fails without an artifact.
fn run_report(
    dataset: &Dataset,
    now: DateTime<Utc>,
    reports_dir: &std::path::Path,
    run_id: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    std::fs::create_dir_all(reports_dir)
        .with_context(|| format!("failed to create reports dir {}", reports_dir.display()))?;

    let mut rows = Vec::with_capacity(dataset.store_ids().len());
    for store_id in dataset.store_ids() {
        if cancel.is_cancelled() {
            bail!("report run cancelled");
        }
        rows.push(report::store_row(dataset, store_id, now));
    }

    let path = reports_dir.join(format!("{}.csv", run_id));
    std::fs::write(&path, report::render_csv(&rows))
        .with_context(|| format!("failed to write report artifact {}", path.display()))?;
    Ok(path)
}
