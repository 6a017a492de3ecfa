//! The agent-facing half of the system: routing (Orchestrator), system
//! prompt assembly (Context Builder), the tool-use loop (Executor), rolling
//! history compression (Summarizer), and the tool registry (C6).

pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod summarizer;
pub mod tools;

pub use context::{BuildInput, BuiltContext, ContextBuilder, HistoryTurn, Overrides};
pub use executor::{ExecuteOptions, ExecuteOutcome, Executor};
pub use orchestrator::{resolve_model, Complexity, Intent, Orchestrator, PersonalityLevel, RoutingDecision, SkillSummary};
pub use summarizer::Summarizer;
pub use tools::{static_tools, to_definitions, Tool, ToolResult};
