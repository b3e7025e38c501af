pub mod jobs;

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use cron::Schedule;
use tokio::sync::watch;
use tokio::sync::Mutex;

use crate::utils;

pub enum JobSchedule {
    /// Fires on a cron schedule evaluated in the bot timezone.
    Cron(Schedule),
    /// Fires immediately and then on a fixed period.
    Every(Duration),
}

impl JobSchedule {
    pub fn daily_at(hour: u32, minute: u32) -> anyhow::Result<Self> {
        let schedule = Schedule::from_str(&format!("0 {minute} {hour} * * *"))?;

        Ok(Self::Cron(schedule))
    }

    pub fn every(period: Duration) -> Self {
        Self::Every(period)
    }
}

/// Named background jobs. Every job runs as its own task that sleeps until
/// the next slot. Removing or replacing a job signals the task to stop
/// before its next run, a run already in flight is never interrupted.
pub struct JobRegistry {
    tz: FixedOffset,
    jobs: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl JobRegistry {
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            tz,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a job under a stable id, replacing any previous job with
    /// the same id.
    pub async fn register<F, Fut>(&self, id: &str, schedule: JobSchedule, run: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (stop, stopped) = watch::channel(false);

        tokio::spawn(job_loop(id.to_owned(), self.tz, schedule, run, stopped));

        let previous = self.jobs.lock().await.insert(id.to_owned(), stop);

        if let Some(previous) = previous {
            previous.send(true).ok();
        }
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.jobs.lock().await.remove(id);

        match removed {
            Some(stop) => {
                stop.send(true).ok();

                true
            },
            None => false,
        }
    }

    pub async fn remove_by_prefix(&self, prefix: &str) -> usize {
        let mut jobs = self.jobs.lock().await;
        let ids: Vec<_> = jobs
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();

        for id in &ids {
            if let Some(stop) = jobs.remove(id) {
                stop.send(true).ok();
            }
        }

        ids.len()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.jobs.lock().await.contains_key(id)
    }

    pub async fn count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.jobs.lock().await.keys().cloned().collect();
        ids.sort();

        ids
    }

    pub async fn shutdown(&self) {
        for (_, stop) in self.jobs.lock().await.drain() {
            stop.send(true).ok();
        }
    }
}

async fn job_loop<F, Fut>(
    id: String,
    tz: FixedOffset,
    schedule: JobSchedule,
    run: F,
    mut stopped: watch::Receiver<bool>,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut first = true;

    loop {
        let delay = match &schedule {
            JobSchedule::Cron(schedule) => {
                let Some(next) = schedule.upcoming(tz).next() else {
                    tracing::warn!(job = id, "Schedule has no upcoming slot, stopping");
                    break;
                };

                (next - Utc::now().with_timezone(&tz))
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            },
            JobSchedule::Every(period) => {
                if first {
                    Duration::ZERO
                } else {
                    *period
                }
            },
        };

        first = false;

        tokio::select! {
            _ = tokio::time::sleep(delay) => {},
            _ = stopped.changed() => break,
            _ = utils::ctrl_c() => {
                tracing::debug!(job = id, "Received terminate signal. Stop processing");
                break;
            },
        }

        if *stopped.borrow() {
            break;
        }

        if let Err(err) = run().await {
            tracing::error!(job = id, err = ?err, "Job run failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn registry() -> JobRegistry {
        JobRegistry::new(FixedOffset::east_opt(5 * 3600).unwrap())
    }

    fn far_future() -> JobSchedule {
        JobSchedule::every(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn registers_and_removes() {
        let registry = registry();

        registry
            .register("debt_reminder:1", far_future(), || async { anyhow::Ok(()) })
            .await;

        assert!(registry.contains("debt_reminder:1").await);
        assert!(registry.remove("debt_reminder:1").await);
        assert!(!registry.contains("debt_reminder:1").await);
        assert!(!registry.remove("debt_reminder:1").await);
    }

    #[tokio::test]
    async fn replaces_job_with_same_id() {
        let registry = registry();

        registry
            .register("debt_reminder:1", far_future(), || async { anyhow::Ok(()) })
            .await;
        registry
            .register("debt_reminder:1", far_future(), || async { anyhow::Ok(()) })
            .await;

        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn removes_by_prefix() {
        let registry = registry();

        registry
            .register("debt_reminder:1", far_future(), || async { anyhow::Ok(()) })
            .await;
        registry
            .register("debt_reminder:2", far_future(), || async { anyhow::Ok(()) })
            .await;
        registry
            .register("rate_alert:1", far_future(), || async { anyhow::Ok(()) })
            .await;

        let removed = registry.remove_by_prefix("debt_reminder:").await;

        assert_eq!(removed, 2);
        assert_eq!(registry.ids().await, vec!["rate_alert:1".to_owned()]);
    }

    #[test]
    fn daily_schedule_finds_next_slot() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let JobSchedule::Cron(schedule) = JobSchedule::daily_at(9, 30).unwrap() else {
            panic!("daily_at should build a cron schedule");
        };

        let before = tz.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let next = schedule.after(&before).next().unwrap();

        assert_eq!(next, tz.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap());

        let after = tz.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let next = schedule.after(&after).next().unwrap();

        assert_eq!(next, tz.with_ymd_and_hms(2024, 3, 11, 9, 30, 0).unwrap());
    }
}
