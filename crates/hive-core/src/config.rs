use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Per-model pricing, US$ per 1M tokens (input, output). See spec §4.3.
pub const PRICE_HAIKU: (f64, f64) = (0.25, 1.25);
pub const PRICE_SONNET: (f64, f64) = (3.0, 15.0);
pub const PRICE_OPUS: (f64, f64) = (15.0, 75.0);

/// Top-level config (hive.toml + HIVE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            executor: ExecutorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            scheduler: SchedulerConfig::default(),
            debug: DebugConfig::default(),
            sandbox: SandboxConfig::default(),
            trigger: TriggerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Script Runner settings (spec §4.11, C12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter invoked on the runner harness, e.g. `"node"`.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_script_output_cap")]
    pub max_output_bytes: usize,
    #[serde(default = "default_script_stderr_cap")]
    pub max_stderr_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_script_timeout_secs(),
            max_output_bytes: default_script_output_cap(),
            max_stderr_bytes: default_script_stderr_cap(),
        }
    }
}

/// Workflow trigger settings (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_trigger_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_trigger_max_per_window")]
    pub rate_limit_max: u32,
    #[serde(default = "default_confirmation_ttl_secs")]
    pub confirmation_ttl_secs: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_secs: default_trigger_window_secs(),
            rate_limit_max: default_trigger_max_per_window(),
            confirmation_ttl_secs: default_confirmation_ttl_secs(),
        }
    }
}

/// Outbound notification chunking (spec §6: "notifier must chunk … at 4096
/// characters on newline boundaries").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

/// Maps `routing.complexity` to concrete model ids (spec §4.6 step 12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_model_simple")]
    pub simple: String,
    #[serde(default = "default_model_default")]
    pub default: String,
    #[serde(default = "default_model_complex")]
    pub complex: String,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            simple: default_model_simple(),
            default: default_model_default(),
            complex: default_model_complex(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl ExecutorConfig {
    /// Concrete provider model id bound to a cost tier.
    pub fn model_id(&self, tier: crate::types::ModelTier) -> &str {
        match tier {
            crate::types::ModelTier::Haiku => &self.simple,
            crate::types::ModelTier::Sonnet => &self.default,
            crate::types::ModelTier::Opus => &self.complex,
        }
    }
}

/// Orchestrator primary/fallback model ids (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_model_simple")]
    pub primary_model: String,
    #[serde(default = "default_model_simple")]
    pub fallback_model: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            primary_model: default_model_simple(),
            fallback_model: default_model_simple(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_secs: default_watchdog_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    /// Capture every Gateway turn keyed by (userId, conversationId). Fire-and-forget.
    #[serde(default)]
    pub enabled: bool,
}

fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.hive", home)
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.hive/data.db", home)
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model_simple() -> String {
    "claude-haiku-4-5".to_string()
}
fn default_model_default() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_model_complex() -> String {
    "claude-opus-4-1".to_string()
}
fn default_max_tool_rounds() -> u32 {
    5
}
fn default_watchdog_secs() -> u64 {
    300
}
fn default_interpreter() -> String {
    "node".to_string()
}
fn default_script_timeout_secs() -> u64 {
    60
}
fn default_script_output_cap() -> usize {
    1024 * 1024
}
fn default_script_stderr_cap() -> usize {
    10 * 1024
}
fn default_trigger_window_secs() -> u64 {
    60
}
fn default_trigger_max_per_window() -> u32 {
    3
}
fn default_confirmation_ttl_secs() -> u64 {
    60
}
fn default_chunk_size() -> usize {
    4096
}

impl HiveConfig {
    /// Load config from a TOML file with HIVE_* env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.hive/hive.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HiveConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HIVE_").split("_"))
            .extract()
            .map_err(|e| crate::error::HiveError::NotConfigured(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.hive/hive.toml", home)
}
