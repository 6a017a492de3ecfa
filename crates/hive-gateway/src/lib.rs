//! Gateway composition (spec §4.6, C7): the per-message state machine, its
//! supporting identity/skill/override resolvers, the reminder sweeper, and
//! the HTTP surface and CLI entrypoint that expose it.

pub mod app;
pub mod cli;
pub mod gateway;
pub mod http;
pub mod identity;
pub mod notify;
pub mod overrides;
pub mod reminder_sweep;
pub mod skills;

pub use gateway::{Gateway, GatewayOptions, GatewayResponse, MessageInput};
pub use notify::LoggingNotificationSender;
