pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::HiveConfig;
pub use error::{HiveError, Result};
pub use types::{sanitize_user_id, split_channel_prefix, Channel, ModelTier, UserId, SYSTEM_USER_ID};
