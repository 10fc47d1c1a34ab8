use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "umlforge.toml",
    "config/umlforge.toml",
    "crates/config/umlforge.toml",
    "../umlforge.toml",
    "../config/umlforge.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub ollama: OllamaConfig,
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

/// Connection settings for the upstream Ollama runtime.
///
/// ```
/// use umlforge_config::OllamaConfig;
///
/// let ollama = OllamaConfig::default();
/// assert_eq!(ollama.base_url, "http://localhost:11434");
/// assert_eq!(ollama.request_timeout_seconds, 600);
/// assert_eq!(ollama.probe_timeout_seconds, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "OllamaConfig::default_base_url")]
    pub base_url: String,
    /// Applies to vision extraction and streamed generation.
    #[serde(default = "OllamaConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Applies to lightweight calls such as the health probe.
    #[serde(default = "OllamaConfig::default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

impl OllamaConfig {
    fn default_base_url() -> String {
        "http://localhost:11434".to_string()
    }

    const fn default_request_timeout() -> u64 {
        600
    }

    const fn default_probe_timeout() -> u64 {
        30
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            probe_timeout_seconds: Self::default_probe_timeout(),
        }
    }
}

/// Pinned models and upload limits for the generation pipeline. Callers of the
/// HTTP API cannot override any of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "OrchestratorConfig::default_vision_model")]
    pub vision_model: String,
    #[serde(default = "OrchestratorConfig::default_text_model")]
    pub text_model: String,
    #[serde(default = "OrchestratorConfig::default_max_images")]
    pub max_images: usize,
    #[serde(default = "OrchestratorConfig::default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl OrchestratorConfig {
    fn default_vision_model() -> String {
        "qwen2.5vl:7b".to_string()
    }

    fn default_text_model() -> String {
        "qwen2.5-coder:7b".to_string()
    }

    const fn default_max_images() -> usize {
        5
    }

    const fn default_max_image_bytes() -> usize {
        10 * 1024 * 1024
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            vision_model: Self::default_vision_model(),
            text_model: Self::default_text_model(),
            max_images: Self::default_max_images(),
            max_image_bytes: Self::default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "CorsConfig::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    fn default_allowed_origins() -> Vec<String> {
        vec![
            "http://localhost:3000".to_string(),
            "http://localhost:5173".to_string(),
        ]
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Self::default_allowed_origins(),
        }
    }
}

fn to_i64(value: impl TryInto<i64>) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use umlforge_config::load;
///
/// std::env::remove_var("UMLFORGE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("ollama.base_url", defaults.ollama.base_url.clone())?
        .set_default(
            "ollama.request_timeout_seconds",
            to_i64(defaults.ollama.request_timeout_seconds),
        )?
        .set_default(
            "ollama.probe_timeout_seconds",
            to_i64(defaults.ollama.probe_timeout_seconds),
        )?
        .set_default(
            "orchestrator.vision_model",
            defaults.orchestrator.vision_model.clone(),
        )?
        .set_default(
            "orchestrator.text_model",
            defaults.orchestrator.text_model.clone(),
        )?
        .set_default(
            "orchestrator.max_images",
            to_i64(defaults.orchestrator.max_images),
        )?
        .set_default(
            "orchestrator.max_image_bytes",
            to_i64(defaults.orchestrator.max_image_bytes),
        )?
        .set_default("cors.allowed_origins", defaults.cors.allowed_origins.clone())?;

    let environment_overrides = config::Environment::with_prefix("UMLFORGE")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("cors.allowed_origins")
        .try_parsing(true);

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("UMLFORGE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path = %path, "loading configuration via UMLFORGE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.orchestrator.max_images == 0 {
        anyhow::bail!("orchestrator.max_images must be at least 1");
    }

    debug!(?config, "loaded gateway configuration");
    Ok(config)
}
