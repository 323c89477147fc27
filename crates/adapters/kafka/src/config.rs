//! Kafka 消费配置模块

use std::collections::HashMap;
use std::time::Duration;

use puente_errors::{AppError, AppResult};

/// Kafka 安全协议
#[derive(Debug, Clone, Default)]
pub enum SecurityProtocol {
    /// 明文（默认）
    #[default]
    Plaintext,
    /// SSL
    Ssl,
    /// SASL 明文
    SaslPlaintext,
    /// SASL SSL
    SaslSsl,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }
}

/// SASL 认证机制
#[derive(Debug, Clone)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl SaslMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

/// SASL 配置
#[derive(Debug, Clone)]
pub struct SaslConfig {
    /// 认证机制
    pub mechanism: SaslMechanism,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
}

impl SaslConfig {
    pub fn plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mechanism: SaslMechanism::Plain,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn scram_sha256(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mechanism: SaslMechanism::ScramSha256,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn scram_sha512(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mechanism: SaslMechanism::ScramSha512,
            username: username.into(),
            password: password.into(),
        }
    }
}

/// 位点重置策略
#[derive(Debug, Clone, Default)]
pub enum AutoOffsetReset {
    /// 从最早的记录开始（默认）
    #[default]
    Earliest,
    /// 只读新记录
    Latest,
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoOffsetReset::Earliest => "earliest",
            AutoOffsetReset::Latest => "latest",
        }
    }
}

/// Kafka 消费端配置
///
/// 除显式字段外，`properties` 里的键值原样透传给底层客户端；
/// 唯一例外是 `enable.auto.commit`，消费语义要求手动提交，始终强制为
/// `false`。
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub auto_offset_reset: AutoOffsetReset,
    /// 会话超时
    pub session_timeout: Duration,
    /// 单批最多拉取的记录数
    pub max_poll_records: usize,
    /// 无限等待模式下单次 poll 的时间片
    pub poll_slice: Duration,
    pub security_protocol: SecurityProtocol,
    pub sasl: Option<SaslConfig>,
    /// 透传给底层客户端的额外属性
    pub properties: HashMap<String, String>,
}

impl KafkaConsumerConfig {
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            auto_offset_reset: AutoOffsetReset::default(),
            session_timeout: Duration::from_secs(10),
            max_poll_records: 500,
            poll_slice: Duration::from_millis(100),
            security_protocol: SecurityProtocol::default(),
            sasl: None,
            properties: HashMap::new(),
        }
    }

    /// 从应用配置构建
    pub fn from_settings(settings: &puente_config::KafkaConfig) -> AppResult<Self> {
        let auto_offset_reset = match settings.auto_offset_reset.as_str() {
            "earliest" => AutoOffsetReset::Earliest,
            "latest" => AutoOffsetReset::Latest,
            other => {
                return Err(AppError::config(format!(
                    "unknown auto_offset_reset '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            auto_offset_reset,
            max_poll_records: settings.max_poll_records,
            poll_slice: Duration::from_millis(settings.poll_slice_ms),
            ..Self::new(&settings.brokers, &settings.group_id)
        })
    }

    pub fn with_auto_offset_reset(mut self, reset: AutoOffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_max_poll_records(mut self, max_poll_records: usize) -> Self {
        self.max_poll_records = max_poll_records;
        self
    }

    pub fn with_poll_slice(mut self, poll_slice: Duration) -> Self {
        self.poll_slice = poll_slice;
        self
    }

    pub fn with_sasl(mut self, protocol: SecurityProtocol, sasl: SaslConfig) -> Self {
        self.security_protocol = protocol;
        self.sasl = Some(sasl);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 展开为底层客户端的键值对
    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("bootstrap.servers".to_string(), self.brokers.clone()),
            ("group.id".to_string(), self.group_id.clone()),
            (
                "auto.offset.reset".to_string(),
                self.auto_offset_reset.as_str().to_string(),
            ),
            (
                "session.timeout.ms".to_string(),
                self.session_timeout.as_millis().to_string(),
            ),
            (
                "security.protocol".to_string(),
                self.security_protocol.as_str().to_string(),
            ),
        ];

        if let Some(sasl) = &self.sasl {
            entries.push((
                "sasl.mechanism".to_string(),
                sasl.mechanism.as_str().to_string(),
            ));
            entries.push(("sasl.username".to_string(), sasl.username.clone()));
            entries.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        for (key, value) in &self.properties {
            entries.push((key.clone(), value.clone()));
        }

        // 手动提交是本适配器的根本约定，放在最后压过任何透传属性
        entries.push(("enable.auto.commit".to_string(), "false".to_string()));

        entries
    }
}
