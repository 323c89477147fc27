//! puente-errors - 统一错误处理
//!
//! 消费端错误分类：配置/校验错误快速失败，broker 错误原样向上传播，
//! 不在本层重试

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Consumer closed: {0}")]
    Closed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    pub fn commit(msg: impl Into<String>) -> Self {
        Self::Commit(msg.into())
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self::Closed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 稳定的错误码，用于日志字段
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::Broker(_) => "broker",
            Self::Commit(_) => "commit",
            Self::Closed(_) => "closed",
            Self::Internal(_) => "internal",
        }
    }

    /// 是否为终态错误（重建句柄也无法恢复）
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_) | Self::Closed(_))
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;
