//! In-process cron registry (spec §4.8, C9): missed-run catch-up on boot,
//! per-schedule async tasks with no-overlap ticking, and a 5-minute
//! watchdog that re-registers dropped jobs.

pub mod cron;
mod engine;

pub use engine::{SchedulerEngine, WorkflowRunner};
