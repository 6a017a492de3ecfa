//! Workflow engine, scheduler glue, and phrase trigger (spec §4.7–§4.9,
//! C8/C10). The cron registry itself lives in `hive-scheduler`; this crate
//! supplies the `WorkflowRunner` implementation it drives.

pub mod engine;
pub mod interpolate;
pub mod trigger;
pub mod types;

pub use engine::{chunk_message, GatewayCaller, NotificationSender, WorkflowEngine};
pub use trigger::{extract_name, TriggerOutcome, WorkflowTrigger};
pub use types::{InputMapping, RunOutcomeStatus, StepDefinition, StepResult, StepStatus, WorkflowExecutionResult};
