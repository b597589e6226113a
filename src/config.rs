//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the `-f` path) relative to the current
//! working directory, then applies `LIVECHAT_WORK_DIR` and
//! `LIVECHAT_LOG_LEVEL` env overrides. The LLM API key is only ever read from
//! `LLM_API_KEY`.
//!
//! Every section is optional except `[supervisor]`; missing values fall back
//! to the `Default` impls below, which carry the production values.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::engine::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::error::AppError;

// ── Resolved config ───────────────────────────────────────────────────────────

/// Document store selection and collection names (`[store]`).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `"json"` (files under `{work_dir}/store`) or `"memory"`.
    pub backend: String,
    pub sessions_collection: String,
    pub messages_collection: String,
    pub settings_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "json".into(),
            sessions_collection: "web_chat_sessions".into(),
            messages_collection: "web_chat_messages".into(),
            settings_collection: "settings".into(),
        }
    }
}

/// OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// HTTP client timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.groq.com/openai/v1/chat/completions".into(),
            model: "llama-3.3-70b-versatile".into(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_seconds: 30,
        }
    }
}

/// LLM transport configuration (`[llm]`).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `"dummy"` or `"openai"` / `"openai-compatible"`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "dummy".into(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// Keyword lists driving sentiment and handover heuristics.
/// Matching is case-insensitive substring; list order is match order.
#[derive(Debug, Clone)]
pub struct PhraseLists {
    pub frustrated: Vec<String>,
    pub positive: Vec<String>,
    /// Visitor explicitly asks for a human.
    pub human_request: Vec<String>,
    /// Bot reply admits it is unsure.
    pub uncertainty: Vec<String>,
}

const DEFAULT_FRUSTRATED: &[&str] = &[
    "tidak membantu", "payah", "lambat", "bingung", "kesel", "marah",
    "kecewa", "buruk", "jelek", "lama sekali", "susah", "ribet",
    "bodoh", "tolol", "goblok", "bangsat", "anjing", "babi",
];

const DEFAULT_POSITIVE: &[&str] = &[
    "terima kasih", "makasih", "bagus", "hebat", "mantap", "keren",
    "membantu", "jelas", "paham", "mengerti", "terbantu", "baik",
];

const DEFAULT_HUMAN_REQUEST: &[&str] = &[
    "bicara dengan manusia", "hubungi admin", "chat admin",
    "bicara admin", "mau ke admin", "operator", "cs",
    "customer service", "complaint", "komplain",
];

const DEFAULT_UNCERTAINTY: &[&str] = &[
    "tidak yakin", "kurang tahu", "sebaiknya hubungi",
    "lebih baik tanya", "konsultasikan", "tim kami",
];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for PhraseLists {
    fn default() -> Self {
        Self {
            frustrated: owned(DEFAULT_FRUSTRATED),
            positive: owned(DEFAULT_POSITIVE),
            human_request: owned(DEFAULT_HUMAN_REQUEST),
            uncertainty: owned(DEFAULT_UNCERTAINTY),
        }
    }
}

/// AI response engine configuration (`[engine]`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub system_prompt: String,
    /// TOML file with `[[items]]` knowledge entries; `None` = empty index.
    pub knowledge_file: Option<PathBuf>,
    /// History entries forwarded to the model.
    pub history_window: usize,
    /// Reported confidence. A placeholder, not derived from anything.
    pub confidence: f64,
    /// Upper bound on one model call.
    pub timeout: Duration,
    pub phrases: PhraseLists,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            knowledge_file: None,
            history_window: 10,
            confidence: 0.8,
            timeout: Duration::from_secs(30),
            phrases: PhraseLists::default(),
        }
    }
}

/// Message pipeline configuration (`[pipeline]`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Messages loaded from the session to build history.
    pub history_limit: usize,
    /// Consecutive AI failures after which the canned reply offers a human.
    pub escalate_after_failures: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            escalate_after_failures: 2,
        }
    }
}

/// Agent presence configuration (`[presence]`).
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Capacity ceiling given to newly reported agents. Advisory only.
    pub max_chats: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { max_chats: 5 }
    }
}

/// Inactivity reaper configuration (`[reaper]`).
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub enabled: bool,
    /// Time between sweeps.
    pub interval: Duration,
    /// Sessions idle longer than this are closed.
    pub inactive_after: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            inactive_after: Duration::from_secs(6 * 60),
        }
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Working directory for persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    /// From `LLM_API_KEY`; `None` for keyless local models. Never from TOML.
    pub llm_api_key: Option<String>,
    pub engine: EngineConfig,
    pub pipeline: PipelineConfig,
    pub presence: PresenceConfig,
    pub reaper: ReaperConfig,
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    supervisor: RawSupervisor,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    engine: RawEngine,
    #[serde(default)]
    pipeline: RawPipeline,
    #[serde(default)]
    presence: RawPresence,
    #[serde(default)]
    reaper: RawReaper,
}

#[derive(Deserialize)]
struct RawSupervisor {
    bot_name: String,
    work_dir: String,
    log_level: String,
}

#[derive(Deserialize, Default)]
struct RawStore {
    backend: Option<String>,
    sessions_collection: Option<String>,
    messages_collection: Option<String>,
    settings_collection: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default")]
    provider: Option<String>,
    #[serde(default)]
    openai: RawOpenAi,
}

#[derive(Deserialize, Default)]
struct RawOpenAi {
    api_base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Default)]
struct RawEngine {
    /// Path to a text file holding the system prompt.
    system_prompt_file: Option<String>,
    knowledge_file: Option<String>,
    history_window: Option<usize>,
    confidence: Option<f64>,
    timeout_seconds: Option<u64>,
    frustrated_phrases: Option<Vec<String>>,
    positive_phrases: Option<Vec<String>>,
    human_request_phrases: Option<Vec<String>>,
    uncertainty_phrases: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct RawPipeline {
    history_limit: Option<usize>,
    escalate_after_failures: Option<u32>,
}

#[derive(Deserialize, Default)]
struct RawPresence {
    max_chats: Option<u32>,
}

#[derive(Deserialize, Default)]
struct RawReaper {
    enabled: Option<bool>,
    interval_seconds: Option<u64>,
    inactive_after_seconds: Option<u64>,
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("LIVECHAT_WORK_DIR").ok();
    let log_level_override = env::var("LIVECHAT_LOG_LEVEL").ok();
    let mut config = load_from(
        Path::new(path.unwrap_or("config/default.toml")),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )?;
    config.llm_api_key = env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
    Ok(config)
}

/// Internal loader: explicit path and overrides, no env access.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.supervisor;
    let work_dir = expand_home(work_dir_override.unwrap_or(&s.work_dir));
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();

    Ok(Config {
        bot_name: s.bot_name,
        work_dir,
        log_level,
        store: resolve_store(parsed.store),
        llm: resolve_llm(parsed.llm),
        llm_api_key: None,
        engine: resolve_engine(parsed.engine)?,
        pipeline: resolve_pipeline(parsed.pipeline)?,
        presence: PresenceConfig {
            max_chats: parsed.presence.max_chats.unwrap_or(PresenceConfig::default().max_chats),
        },
        reaper: resolve_reaper(parsed.reaper)?,
    })
}

fn resolve_store(raw: RawStore) -> StoreConfig {
    let d = StoreConfig::default();
    StoreConfig {
        backend: raw.backend.unwrap_or(d.backend),
        sessions_collection: raw.sessions_collection.unwrap_or(d.sessions_collection),
        messages_collection: raw.messages_collection.unwrap_or(d.messages_collection),
        settings_collection: raw.settings_collection.unwrap_or(d.settings_collection),
    }
}

fn resolve_llm(raw: RawLlm) -> LlmConfig {
    let d = OpenAiConfig::default();
    LlmConfig {
        provider: raw.provider.unwrap_or_else(|| LlmConfig::default().provider),
        openai: OpenAiConfig {
            api_base_url: raw.openai.api_base_url.unwrap_or(d.api_base_url),
            model: raw.openai.model.unwrap_or(d.model),
            temperature: raw.openai.temperature.unwrap_or(d.temperature),
            max_tokens: raw.openai.max_tokens.unwrap_or(d.max_tokens),
            timeout_seconds: raw.openai.timeout_seconds.unwrap_or(d.timeout_seconds),
        },
    }
}

fn resolve_engine(raw: RawEngine) -> Result<EngineConfig, AppError> {
    let d = EngineConfig::default();

    let system_prompt = match raw.system_prompt_file {
        Some(file) => {
            let path = expand_home(&file);
            let text = fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("cannot read system prompt {}: {e}", path.display()))
            })?;
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(AppError::Config(format!("system prompt {} is empty", path.display())));
            }
            text
        }
        None => d.system_prompt,
    };

    let timeout_secs = raw.timeout_seconds.unwrap_or(d.timeout.as_secs());
    if timeout_secs == 0 {
        return Err(AppError::Config("engine.timeout_seconds must be > 0".into()));
    }

    Ok(EngineConfig {
        system_prompt,
        knowledge_file: raw.knowledge_file.map(|f| expand_home(&f)),
        history_window: raw.history_window.unwrap_or(d.history_window),
        confidence: raw.confidence.unwrap_or(d.confidence),
        timeout: Duration::from_secs(timeout_secs),
        phrases: PhraseLists {
            frustrated: raw.frustrated_phrases.unwrap_or(d.phrases.frustrated),
            positive: raw.positive_phrases.unwrap_or(d.phrases.positive),
            human_request: raw.human_request_phrases.unwrap_or(d.phrases.human_request),
            uncertainty: raw.uncertainty_phrases.unwrap_or(d.phrases.uncertainty),
        },
    })
}

fn resolve_pipeline(raw: RawPipeline) -> Result<PipelineConfig, AppError> {
    let d = PipelineConfig::default();
    let escalate_after_failures = raw.escalate_after_failures.unwrap_or(d.escalate_after_failures);
    if escalate_after_failures == 0 {
        return Err(AppError::Config("pipeline.escalate_after_failures must be > 0".into()));
    }
    Ok(PipelineConfig {
        history_limit: raw.history_limit.unwrap_or(d.history_limit),
        escalate_after_failures,
    })
}

fn resolve_reaper(raw: RawReaper) -> Result<ReaperConfig, AppError> {
    let d = ReaperConfig::default();
    let interval = raw.interval_seconds.map(Duration::from_secs).unwrap_or(d.interval);
    if interval.is_zero() {
        return Err(AppError::Config("reaper.interval_seconds must be > 0".into()));
    }
    Ok(ReaperConfig {
        enabled: raw.enabled.unwrap_or(d.enabled),
        interval,
        inactive_after: raw
            .inactive_after_seconds
            .map(Duration::from_secs)
            .unwrap_or(d.inactive_after),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
work_dir = "~/.livechat"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.store.backend, "json");
        assert_eq!(cfg.store.sessions_collection, "web_chat_sessions");
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.openai.max_tokens, 500);
        assert_eq!(cfg.engine.timeout, Duration::from_secs(30));
        assert_eq!(cfg.engine.history_window, 10);
        assert_eq!(cfg.pipeline.history_limit, 20);
        assert_eq!(cfg.pipeline.escalate_after_failures, 2);
        assert_eq!(cfg.presence.max_chats, 5);
        assert_eq!(cfg.reaper.inactive_after, Duration::from_secs(360));
        assert!(cfg.engine.phrases.frustrated.iter().any(|p| p == "kesel"));
    }

    #[test]
    fn sections_override_defaults() {
        let f = write_toml(
            r#"
[supervisor]
bot_name = "b"
work_dir = "/tmp/lc"
log_level = "debug"

[store]
backend = "memory"

[llm]
default = "openai"

[llm.openai]
model = "small-model"
temperature = 0.1

[engine]
history_window = 4
positive_phrases = ["nice"]

[reaper]
enabled = false
interval_seconds = 5
inactive_after_seconds = 120
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.store.backend, "memory");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "small-model");
        assert_eq!(cfg.engine.history_window, 4);
        assert_eq!(cfg.engine.phrases.positive, vec!["nice".to_string()]);
        // untouched lists keep their defaults
        assert!(!cfg.engine.phrases.frustrated.is_empty());
        assert!(!cfg.reaper.enabled);
        assert_eq!(cfg.reaper.interval, Duration::from_secs(5));
        assert_eq!(cfg.reaper.inactive_after, Duration::from_secs(120));
    }

    #[test]
    fn system_prompt_read_from_file() {
        let mut prompt = NamedTempFile::new().unwrap();
        prompt.write_all(b"  You are a test bot.\n").unwrap();
        let toml = format!(
            "{MINIMAL_TOML}\n[engine]\nsystem_prompt_file = \"{}\"\n",
            prompt.path().display()
        );
        let f = write_toml(&toml);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.engine.system_prompt, "You are a test bot.");
    }

    #[test]
    fn missing_prompt_file_errors() {
        let toml = format!("{MINIMAL_TOML}\n[engine]\nsystem_prompt_file = \"/nonexistent/p.txt\"\n");
        let f = write_toml(&toml);
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("system prompt"));
    }

    #[test]
    fn zero_escalation_threshold_rejected() {
        let toml = format!("{MINIMAL_TOML}\n[pipeline]\nescalate_after_failures = 0\n");
        let f = write_toml(&toml);
        assert!(load_from(f.path(), None, None).is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.livechat");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".livechat"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_overrides_applied() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/test-override"), Some("trace")).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/test-override"));
        assert_eq!(cfg.log_level, "trace");
    }
}
