//! puente-config - 配置加载库
//!
//! 分层加载：default.toml → {APP_ENV}.toml → 环境变量

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// Kafka 消费配置
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    /// 无限等待模式下单次 poll 的时间片（毫秒）
    #[serde(default = "default_poll_slice_ms")]
    pub poll_slice_ms: u64,
    /// 单批最多拉取的记录数
    #[serde(default = "default_max_poll_records")]
    pub max_poll_records: usize,
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
}

fn default_poll_slice_ms() -> u64 {
    100
}

fn default_max_poll_records() -> usize {
    500
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub kafka: KafkaConfig,
    #[serde(default = "default_telemetry")]
    pub telemetry: TelemetryConfig,
}

fn default_telemetry() -> TelemetryConfig {
    TelemetryConfig {
        log_level: default_log_level(),
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("PUENTE_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
