use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hive_core::Result;
use hive_store::types::Schedule;
use hive_store::Store;
use tokio_util::sync::CancellationToken;

use crate::cron::next_run_time;

/// Decouples the scheduler from a concrete workflow-execution crate (spec §9:
/// "pluggable orchestrator provider"). The daemon's composition root supplies
/// the real implementation backed by `hive-workflow`.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn run_workflow(&self, owner_id: &str, workflow_id: &str) -> Result<()>;
}

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(300);

struct Job {
    cancel: CancellationToken,
}

/// In-process cron registry (C9). One independent async task per active
/// schedule guarantees at-most-one-tick-at-a-time per schedule with no
/// cross-schedule ordering (spec §4.8 "Ordering guarantees").
pub struct SchedulerEngine {
    store: Arc<Store>,
    runner: Arc<dyn WorkflowRunner>,
    jobs: DashMap<String, Job>,
}

impl SchedulerEngine {
    pub fn new(store: Arc<Store>, runner: Arc<dyn WorkflowRunner>) -> Arc<Self> {
        Arc::new(Self {
            store,
            runner,
            jobs: DashMap::new(),
        })
    }

    /// Boot sequence (spec §4.8 "Boot"): load every active schedule, run
    /// missed-run catch-up, and register a ticking task for each. Also
    /// starts the 5-minute watchdog.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let schedules = self.store.list_active_schedules()?;
        for schedule in schedules {
            self.register(schedule);
        }
        self.spawn_watchdog();
        Ok(())
    }

    /// `addSchedule` (spec §4.8 "Dynamic maintenance"): replaces any
    /// same-id registration.
    pub fn add_schedule(self: &Arc<Self>, schedule: Schedule) {
        self.cancel_if_present(&schedule.id);
        self.register(schedule);
    }

    /// `removeSchedule`: stops and removes the in-memory registration. The
    /// caller is responsible for deactivating the row in the store.
    pub fn remove_schedule(&self, id: &str) {
        self.cancel_if_present(id);
    }

    /// `reloadSchedules`: a stop-then-start cycle over every active schedule.
    pub async fn reload_schedules(self: &Arc<Self>) -> Result<()> {
        for entry in self.jobs.iter() {
            entry.value().cancel.cancel();
        }
        self.jobs.clear();
        let schedules = self.store.list_active_schedules()?;
        for schedule in schedules {
            self.register(schedule);
        }
        Ok(())
    }

    /// Cancels every registered job. Called on process shutdown.
    pub fn shutdown(&self) {
        for entry in self.jobs.iter() {
            entry.value().cancel.cancel();
        }
        self.jobs.clear();
    }

    fn cancel_if_present(&self, id: &str) {
        if let Some((_, job)) = self.jobs.remove(id) {
            job.cancel.cancel();
        }
    }

    fn register(self: &Arc<Self>, schedule: Schedule) {
        let cancel = CancellationToken::new();
        self.jobs.insert(
            schedule.id.clone(),
            Job {
                cancel: cancel.clone(),
            },
        );

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_schedule_loop(schedule, cancel).await;
        });
    }

    async fn run_schedule_loop(self: Arc<Self>, mut schedule: Schedule, cancel: CancellationToken) {
        // Missed-run catch-up (spec §4.8 step 2): if nextRunAt is already in
        // the past when we start ticking, execute immediately.
        if let Some(next_run_at) = schedule.next_run_at.as_deref() {
            if let Ok(due) = next_run_at.parse::<DateTime<Utc>>() {
                if due <= Utc::now() {
                    tracing::info!(schedule_id = %schedule.id, "missed-run catch-up: executing immediately");
                    self.fire(&schedule).await;
                    if let Some(updated) = self.reload_schedule(&schedule.id) {
                        schedule = updated;
                    }
                }
            }
        }

        loop {
            let now = Utc::now();
            let next = match schedule.next_run_at.as_deref().and_then(|s| s.parse::<DateTime<Utc>>().ok()) {
                Some(ts) if ts > now => ts,
                _ => match next_run_time(&schedule.cron_expression, &schedule.timezone, now) {
                    Some(ts) => ts,
                    None => {
                        tracing::warn!(schedule_id = %schedule.id, cron = %schedule.cron_expression, "unparseable cron expression, job will not tick");
                        return;
                    }
                },
            };

            let sleep_for = (next - now).to_std().unwrap_or(Duration::from_secs(0));
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(schedule_id = %schedule.id, "schedule cancelled");
                    return;
                }
                _ = tokio::time::sleep(sleep_for) => {
                    self.fire(&schedule).await;
                    match self.reload_schedule(&schedule.id) {
                        Some(updated) => schedule = updated,
                        None => return,
                    }
                }
            }
        }
    }

    /// Executes the bound workflow, then atomically records
    /// `{lastRunAt=now, nextRunAt=<next tick>}` (spec §4.8 step 3).
    async fn fire(&self, schedule: &Schedule) {
        if let Err(err) = self.runner.run_workflow(&schedule.owner_id, &schedule.workflow_id).await {
            tracing::error!(schedule_id = %schedule.id, error = %err, "scheduled workflow run failed");
        }

        let now = Utc::now();
        let next = next_run_time(&schedule.cron_expression, &schedule.timezone, now);
        let next_str = next.map(|ts| ts.to_rfc3339()).unwrap_or_default();
        if let Err(err) = self.store.record_tick(&schedule.id, &next_str) {
            tracing::error!(schedule_id = %schedule.id, error = %err, "failed to record schedule tick");
        }
    }

    fn reload_schedule(&self, id: &str) -> Option<Schedule> {
        match self.store.get_schedule(id) {
            Ok(Some(s)) if s.is_active => Some(s),
            Ok(_) => None,
            Err(err) => {
                tracing::error!(schedule_id = %id, error = %err, "failed to reload schedule");
                None
            }
        }
    }

    /// Every 5 minutes, diff active schedules against in-memory
    /// registrations and re-register any missing ones (spec §4.8
    /// "Watchdog").
    fn spawn_watchdog(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCHDOG_INTERVAL).await;
                let active = match engine.store.list_active_schedules() {
                    Ok(s) => s,
                    Err(err) => {
                        tracing::error!(error = %err, "watchdog failed to list active schedules");
                        continue;
                    }
                };
                for schedule in active {
                    if !engine.jobs.contains_key(&schedule.id) {
                        tracing::warn!(schedule_id = %schedule.id, "watchdog re-registering missing schedule job");
                        engine.register(schedule);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WorkflowRunner for CountingRunner {
        async fn run_workflow(&self, _owner_id: &str, _workflow_id: &str) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn add_schedule_twice_keeps_one_active_job() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        let workflow = store.create_workflow("alice", "morning-brief", "[]").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(CountingRunner { count: count.clone() });
        let engine = SchedulerEngine::new(store.clone(), runner);

        let schedule = store
            .create_schedule("alice", &workflow.id, "*/1 * * * *", "UTC")
            .unwrap();

        engine.add_schedule(schedule.clone());
        engine.add_schedule(schedule.clone());
        assert_eq!(engine.jobs.len(), 1);

        engine.shutdown();
    }

    #[tokio::test]
    async fn missed_schedule_fires_immediately_on_register() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        let workflow = store.create_workflow("alice", "daily", "[]").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(CountingRunner { count: count.clone() });
        let engine = SchedulerEngine::new(store.clone(), runner);

        let mut schedule = store
            .create_schedule("alice", &workflow.id, "0 9 * * *", "America/New_York")
            .unwrap();
        let yesterday = Utc::now() - chrono::Duration::days(1);
        store.record_tick(&schedule.id, &yesterday.to_rfc3339()).unwrap();
        schedule.next_run_at = Some(yesterday.to_rfc3339());

        engine.add_schedule(schedule);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        engine.shutdown();
    }
}
