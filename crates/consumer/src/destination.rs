//! 目的地（逻辑流名称）

use puente_errors::{AppError, AppResult};

/// 单个逻辑流的标识，构建后不可变
///
/// 名称校验遵循分区日志的 topic 命名规则：非空、不超过 249 字符、
/// 仅允许字母数字与 `.` `_` `-`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    name: String,
}

const MAX_NAME_LEN: usize = 249;

impl Destination {
    /// 创建指向给定 topic 的目的地
    pub fn topic(name: impl Into<String>) -> AppResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(AppError::validation("destination name must not be empty"));
        }
        if name == "." || name == ".." {
            return Err(AppError::validation(format!(
                "destination name '{}' is reserved",
                name
            )));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AppError::validation(format!(
                "destination name exceeds {} characters",
                MAX_NAME_LEN
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(AppError::validation(format!(
                "destination name contains invalid character '{}'",
                c
            )));
        }

        Ok(Self { name })
    }

    /// 流名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
