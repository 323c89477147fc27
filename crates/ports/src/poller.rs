//! 拉取与提交 trait 定义

use std::time::Duration;

use async_trait::async_trait;
use puente_errors::AppResult;

use crate::{CommitEntry, Record};

/// 可拉取客户端 trait
///
/// `poll` 是非阻塞原语：`Duration::ZERO` 表示“立即返回已就绪的记录”，
/// 非零预算表示客户端内部最多等待这么久。空批是合法结果。
#[async_trait]
pub trait RecordPoller: Send + Sync {
    /// 注册对给定 topic 集合的订阅（可重复调用，幂等）
    fn subscribe(&self, topics: &[&str]) -> AppResult<()>;

    /// 清空当前全部订阅
    fn unsubscribe(&self) -> AppResult<()>;

    /// 拉取一批已就绪的记录，最多等待 `max_wait`
    async fn poll(&self, max_wait: Duration) -> AppResult<Vec<Record>>;

    /// 释放底层客户端
    async fn close(&self) -> AppResult<()>;
}

/// 位点提交 trait
#[async_trait]
pub trait OffsetCommitter: Send + Sync {
    /// 同步提交单条位点，返回前保证 broker 已确认
    async fn commit_sync(&self, entry: &CommitEntry) -> AppResult<()>;
}
