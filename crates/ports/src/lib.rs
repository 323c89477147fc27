//! puente-ports - 底层日志客户端的端口定义
//!
//! 消费核心只依赖两个窄契约：
//! - [`RecordPoller`]：订阅 + 拉取
//! - [`OffsetCommitter`]：位点提交

mod poller;
mod record;

pub use poller::*;
pub use record::*;
