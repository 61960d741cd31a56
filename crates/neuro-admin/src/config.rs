//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、配置文件、`NEURO_` 前缀的环境变量。
//! 环境变量用双下划线分隔层级，例如 `NEURO_API__BASE_URL`。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use neuro_integration::{PollingPolicies, RetryPolicy};
use neuro_report::{PageSetup, ReportFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<NeuroConfig>>,
    /// 配置文件路径，未指定时只使用默认值和环境变量
    config_path: Option<String>,
    validator: ConfigValidator,
}

/// NeuroPredict 完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NeuroConfig {
    /// 推理服务接口
    pub api: ApiConfig,
    /// 激活图轮询
    pub poller: PollerConfig,
    /// 报告生成
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

/// 轮询配置，时间单位均为毫秒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub image_interval_ms: u64,
    pub ensemble_interval_ms: u64,
    pub image_max_attempts: u32,
    pub ensemble_max_attempts: u32,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
    /// 为空表示不设截止时间
    pub deadline_ms: Option<u64>,
}

impl PollerConfig {
    fn policy(&self, interval_ms: u64, max_attempts: u32) -> RetryPolicy {
        let interval = Duration::from_millis(interval_ms);
        RetryPolicy::fixed(interval, max_attempts)
            .with_backoff(
                self.backoff_multiplier,
                Duration::from_millis(self.max_interval_ms.max(interval_ms)),
            )
            .with_deadline(self.deadline_ms.map(Duration::from_millis))
    }

    pub fn image_policy(&self) -> RetryPolicy {
        self.policy(self.image_interval_ms, self.image_max_attempts)
    }

    pub fn ensemble_policy(&self) -> RetryPolicy {
        self.policy(self.ensemble_interval_ms, self.ensemble_max_attempts)
    }

    pub fn policies(&self) -> PollingPolicies {
        PollingPolicies {
            image: self.image_policy(),
            ensemble: self.ensemble_policy(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            image_interval_ms: 3000,
            ensemble_interval_ms: 2000,
            image_max_attempts: 100,
            ensemble_max_attempts: 150,
            backoff_multiplier: 1.0,
            max_interval_ms: 3000,
            deadline_ms: Some(300_000),
        }
    }
}

/// 报告配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 封面与页脚中的产品名
    pub product_name: String,
    pub output_dir: String,
    pub format: ReportFormat,
    pub page: PageSetup,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            product_name: "NeuroPredict".to_string(),
            output_dir: "./reports".to_string(),
            format: ReportFormat::Pdf,
            page: PageSetup::default(),
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` 指令，例如 `info` 或 `neuro_integration=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: String,
    validator: fn(&NeuroConfig) -> Result<()>,
    error_message: String,
}

impl ConfigManager {
    /// 加载并验证配置
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 直接使用给定配置，不读取文件
    pub fn from_config(config: NeuroConfig) -> Result<Self> {
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: None,
            validator,
        })
    }

    fn load_config(config_path: Option<&str>) -> Result<NeuroConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("NEURO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: NeuroConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        Ok(config)
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    /// 配置来源。加载发生在日志初始化之前，由调用方在日志就绪后记录
    pub fn source(&self) -> &str {
        self.config_path.as_deref().unwrap_or("defaults and environment")
    }

    pub async fn get_config(&self) -> NeuroConfig {
        self.config.read().await.clone()
    }

    /// 验证后替换配置，有配置文件时同时写回
    pub async fn update_config(&self, new_config: NeuroConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        if let Some(path) = &self.config_path {
            self.save_to(path).await?;
        }

        info!("Configuration updated");
        Ok(())
    }

    /// 以 TOML 格式保存当前配置
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = {
            let config = self.config.read().await;
            toml::to_string_pretty(&*config).context("Failed to serialize configuration")?
        };

        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.validator.validate(&new_config)?;
        *self.config.write().await = new_config;
        Ok(())
    }

    /// 按点分路径读取配置值，例如 `poller.image_interval_ms`
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.config.read().await;
        let value = extract_nested_value(&config, path)
            .with_context(|| format!("Configuration path not found: {}", path))?;

        serde_json::from_value(value).context("Failed to deserialize configuration value")
    }

    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

fn extract_nested_value(config: &NeuroConfig, path: &str) -> Result<serde_json::Value> {
    let config_json = serde_json::to_value(config).context("Failed to serialize config to JSON")?;

    let mut current = &config_json;
    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
            }
            _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
        }
    }

    Ok(current.clone())
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "api.base_url".to_string(),
                validator: |config| {
                    let url = &config.api.base_url;
                    if url.starts_with("http://") || url.starts_with("https://") {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("'{}' is not an http(s) URL", url))
                    }
                },
                error_message: "Invalid API base URL".to_string(),
            },
            ValidationRule {
                field_path: "api.timeout_secs".to_string(),
                validator: |config| {
                    if config.api.timeout_secs == 0 {
                        Err(anyhow::anyhow!("timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid API timeout".to_string(),
            },
            ValidationRule {
                field_path: "poller".to_string(),
                validator: |config| {
                    let poller = &config.poller;
                    if poller.image_interval_ms == 0 || poller.ensemble_interval_ms == 0 {
                        return Err(anyhow::anyhow!("poll interval cannot be 0"));
                    }
                    if poller.image_max_attempts == 0 || poller.ensemble_max_attempts == 0 {
                        return Err(anyhow::anyhow!("max attempts cannot be 0"));
                    }
                    if !poller.backoff_multiplier.is_finite() || poller.backoff_multiplier < 1.0 {
                        return Err(anyhow::anyhow!(
                            "backoff multiplier must be at least 1.0, got {}",
                            poller.backoff_multiplier
                        ));
                    }
                    if poller.deadline_ms == Some(0) {
                        return Err(anyhow::anyhow!("deadline cannot be 0"));
                    }
                    Ok(())
                },
                error_message: "Invalid poller settings".to_string(),
            },
            ValidationRule {
                field_path: "report.page".to_string(),
                validator: |config| config.report.page.validate().map_err(anyhow::Error::from),
                error_message: "Invalid report page setup".to_string(),
            },
            ValidationRule {
                field_path: "logging.level".to_string(),
                validator: |config| {
                    EnvFilter::try_new(&config.logging.level)
                        .map(|_| ())
                        .map_err(|e| anyhow::anyhow!("{}", e))
                },
                error_message: "Invalid log level".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 按顺序执行规则，遇到第一个失败即返回
    pub fn validate(&self, config: &NeuroConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("neuro-admin-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_defaults_are_valid() {
        let manager = ConfigManager::from_config(NeuroConfig::default()).unwrap();
        manager.validate_config().await.unwrap();
        assert_eq!(manager.source(), "defaults and environment");

        let config = manager.get_config().await;
        assert_eq!(config.report.page.page_width, 210.0);
        assert_eq!(config.report.page.page_height, 297.0);
        assert_eq!(config.poller.image_interval_ms, 3000);
        assert_eq!(config.poller.ensemble_interval_ms, 2000);
    }

    #[test]
    fn test_poller_policies() {
        let poller = PollerConfig::default();
        assert_eq!(poller.image_policy(), RetryPolicy::image());

        let ensemble = poller.ensemble_policy();
        assert_eq!(ensemble.interval, Duration::from_millis(2000));
        assert_eq!(ensemble.max_attempts, 150);
        assert_eq!(ensemble.deadline, Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let path = temp_path("partial.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://predict.example.org\"\n\n[report.page]\nmargin_left = 25.0\n",
        )
        .unwrap();

        let manager = ConfigManager::new(path.to_str()).unwrap();
        assert_eq!(manager.source(), path.to_str().unwrap());
        let config = manager.get_config().await;
        assert_eq!(config.api.base_url, "https://predict.example.org");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.report.page.margin_left, 25.0);
        assert_eq!(config.report.page.margin_right, 20.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let path = temp_path("saved.toml");
        let mut config = NeuroConfig::default();
        config.poller.backoff_multiplier = 1.5;
        config.logging.format = LogFormat::Json;

        let manager = ConfigManager::from_config(config.clone()).unwrap();
        manager.save_to(&path).await.unwrap();

        let reloaded = ConfigManager::new(path.to_str()).unwrap();
        let loaded = reloaded.get_config().await;
        assert_eq!(loaded.poller.backoff_multiplier, 1.5);
        assert_eq!(loaded.logging.format, LogFormat::Json);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_get_value() {
        let manager = ConfigManager::from_config(NeuroConfig::default()).unwrap();
        let interval: u64 = manager.get_value("poller.image_interval_ms").await.unwrap();
        assert_eq!(interval, 3000);

        let product: String = manager.get_value("report.product_name").await.unwrap();
        assert_eq!(product, "NeuroPredict");

        assert!(manager.get_value::<u64>("poller.missing").await.is_err());
    }

    #[test]
    fn test_validation_rules() {
        let validator = ConfigValidator::new();

        let mut config = NeuroConfig::default();
        config.api.base_url = "localhost:8080".into();
        assert!(validator.validate(&config).is_err());

        let mut config = NeuroConfig::default();
        config.poller.image_interval_ms = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = NeuroConfig::default();
        config.poller.backoff_multiplier = 0.5;
        assert!(validator.validate(&config).is_err());

        let mut config = NeuroConfig::default();
        config.report.page.margin_left = 120.0;
        config.report.page.margin_right = 120.0;
        assert!(validator.validate(&config).is_err());

        let mut config = NeuroConfig::default();
        config.logging.level = "neuro=loud".into();
        assert!(validator.validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid() {
        let manager = ConfigManager::from_config(NeuroConfig::default()).unwrap();
        let mut invalid = NeuroConfig::default();
        invalid.api.timeout_secs = 0;

        assert!(manager.update_config(invalid).await.is_err());
        assert_eq!(manager.get_config().await.api.timeout_secs, 30);
    }
}
