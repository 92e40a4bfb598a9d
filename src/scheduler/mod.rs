pub mod tasks;

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Local, TimeZone};
use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What a scheduled job produces on every run
pub type JobFuture = BoxFuture<'static, Result<()>>;

/// Daily and fixed-interval background jobs sharing one shutdown signal.
pub struct Scheduler {
    token: CancellationToken,
    jobs: JoinSet<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            jobs: JoinSet::new(),
        }
    }

    /// Run `task` every day at `hour:00` local time.
    pub fn add_daily_job<F>(&mut self, name: &str, hour: u32, task: F) -> Result<()>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        if hour > 23 {
            bail!("Invalid hour {} for job {}", hour, name);
        }

        let name = name.to_string();
        let token = self.token.clone();
        info!("Scheduled task '{}' daily at {:02}:00", name, hour);
        self.jobs.spawn(async move {
            loop {
                let now = Local::now();
                let Some(next) = next_daily_run(&now, hour) else {
                    error!(job = %name, "No next run time, stopping job");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(job = %name, next = %next, "Waiting for next run");
                if !sleep_or_cancel(&token, wait).await {
                    break;
                }
                run_once(&name, task()).await;
            }
            debug!(job = %name, "Job stopped");
        });
        Ok(())
    }

    /// Run `task` after every `interval`, measured from the end of the previous run.
    pub fn add_interval_job<F>(&mut self, name: &str, interval: Duration, task: F) -> Result<()>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        if interval.is_zero() {
            bail!("Interval for job {} must be positive", name);
        }

        let name = name.to_string();
        let token = self.token.clone();
        info!("Scheduled task '{}' every {:?}", name, interval);
        self.jobs.spawn(async move {
            while sleep_or_cancel(&token, interval).await {
                run_once(&name, task()).await;
            }
            debug!(job = %name, "Job stopped");
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Cancel every loop and wait for them to finish. A run already in
    /// progress completes first.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        while let Some(result) = self.jobs.join_next().await {
            if let Err(e) = result {
                error!("Scheduler loop ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `false` if the token was cancelled before the sleep ended.
async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Run one occurrence in its own task so a panic stays inside it.
async fn run_once<Fut>(name: &str, run: Fut)
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    info!("Running scheduled task: {}", name);
    match tokio::spawn(run).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(job = %name, "Scheduled task failed: {:#}", e),
        Err(e) => error!(job = %name, "Scheduled task panicked: {}", e),
    }
}

/// Next `hour:00` strictly after `now`: today if still ahead, otherwise
/// tomorrow. Days where that local time does not exist are skipped.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Option<DateTime<Tz>> {
    let mut date = now.date_naive();
    for _ in 0..3 {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        if let Some(candidate) = now.timezone().from_local_datetime(&naive).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}
