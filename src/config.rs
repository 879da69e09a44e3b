//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 default 文件，再叠加显式传入的文件，最后用环境变量 `MAILY__*` 覆盖
//! （双下划线表示嵌套，如 `MAILY__MODELS__ACTIVE_MODEL=deepseek-r1`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub models: ModelsConfig,
    pub orchestration: OrchestrationSection,
    pub health: HealthSection,
    pub observability: ObservabilitySection,
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [models] 段：推理后端降级链（只读）
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_active_model")]
    pub active_model: String,
    /// 按声明顺序尝试
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
    /// 长文本（>= fast_threshold_chars）优先使用的后端；未设置时与 active_model 相同
    #[serde(default)]
    pub complex_model: Option<String>,
    #[serde(default = "default_fast_threshold_chars")]
    pub fast_threshold_chars: usize,
}

fn default_active_model() -> String {
    "deepseek-r1".to_string()
}

fn default_fallback_models() -> Vec<String> {
    vec!["azure-gpt-4o".to_string(), "local-llama".to_string()]
}

fn default_fast_threshold_chars() -> usize {
    50
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            active_model: default_active_model(),
            fallback_models: default_fallback_models(),
            complex_model: None,
            fast_threshold_chars: default_fast_threshold_chars(),
        }
    }
}

impl ModelsConfig {
    pub fn new(active_model: impl Into<String>, fallback_models: Vec<String>) -> Self {
        Self {
            active_model: active_model.into(),
            fallback_models,
            ..Default::default()
        }
    }

    /// `[active] + fallback_models`
    pub fn chain(&self) -> Vec<&str> {
        std::iter::once(self.active_model.as_str())
            .chain(self.fallback_models.iter().map(String::as_str))
            .collect()
    }
}

/// [orchestration] 段：默认优先级与重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationSection {
    #[serde(default = "default_priority")]
    pub default_priority: i32,
    /// 失败后等待多久重试（毫秒）
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// 退避倍率；1.0 表示固定间隔
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_priority() -> i32 {
    crate::core::task::DEFAULT_PRIORITY
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_retry_multiplier() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for OrchestrationSection {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_multiplier: default_retry_multiplier(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// [health] 段：自愈监控
#[derive(Debug, Clone, Deserialize)]
pub struct HealthSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// error_count 严格大于该值视为异常
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: u32,
    #[serde(default = "default_remediation_timeout_secs")]
    pub remediation_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_anomaly_threshold() -> u32 {
    5
}

fn default_remediation_timeout_secs() -> u64 {
    30
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            anomaly_threshold: default_anomaly_threshold(),
            remediation_timeout_secs: default_remediation_timeout_secs(),
        }
    }
}

impl HealthSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn remediation_timeout(&self) -> Duration {
        Duration::from_secs(self.remediation_timeout_secs.max(1))
    }
}

/// [observability] 段：事件上报端点；未配置 endpoint 时只写日志
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilitySection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// [server] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// 在候选前缀中找到第一个存在的配置文件（支持 toml / yaml / yml / json）
fn find_config_file(names: &[&str]) -> Option<PathBuf> {
    const EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];
    names.iter().find_map(|name| {
        EXTENSIONS
            .iter()
            .map(|ext| PathBuf::from(format!("{name}.{ext}")))
            .find(|p| p.exists())
    })
}

/// 从 config 目录加载配置，环境变量 MAILY__* 可覆盖
///
/// 1. 按顺序查找 config/default、../config/default、default，找到则作为第一源
/// 2. 查找 config/models（只含 `[models]` 段的独立模型清单），存在则叠加
/// 3. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 4. 最后叠加环境变量 MAILY__*（列表用逗号分隔，如 `MAILY__MODELS__FALLBACK_MODELS=B,C`）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = find_config_file(&["config/default", "../config/default", "default"]) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    if let Some(path) = find_config_file(&["config/models", "../config/models"]) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MAILY")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("models.fallback_models")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.models.chain(), vec!["deepseek-r1", "azure-gpt-4o", "local-llama"]);
        assert_eq!(cfg.models.fast_threshold_chars, 50);
        assert_eq!(cfg.orchestration.max_attempts, 2);
        assert_eq!(cfg.orchestration.default_priority, 5);
        assert_eq!(cfg.health.anomaly_threshold, 5);
        assert_eq!(cfg.health.interval(), Duration::from_secs(5));
        assert!(cfg.observability.endpoint.is_none());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[models]
active_model = "A"
fallback_models = ["B", "C"]
complex_model = "B"

[orchestration]
retry_backoff_ms = 10

[health]
interval_secs = 2
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.models.chain(), vec!["A", "B", "C"]);
        assert_eq!(cfg.models.complex_model.as_deref(), Some("B"));
        assert_eq!(cfg.orchestration.retry_backoff_ms, 10);
        assert_eq!(cfg.orchestration.max_attempts, 2);
        assert_eq!(cfg.health.interval_secs, 2);
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_missing_explicit_file_uses_defaults() {
        let cfg = load_config(Some(PathBuf::from("/nonexistent/maily.toml"))).unwrap();
        assert_eq!(cfg.models.fast_threshold_chars, 50);
    }
}
