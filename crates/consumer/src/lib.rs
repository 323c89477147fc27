//! puente-consumer - 阻塞式点对点消费核心
//!
//! 把“非阻塞批量拉取 + 显式位点提交”的日志客户端适配成
//! 点对点阻塞消费语义：
//! - `receive` 阻塞直到有消息或被 close 取消
//! - `receive_timeout` / `receive_no_wait` 单次有界拉取
//! - 监听器同步回调，位点在返回前提交

mod consumer;
mod destination;
mod listener;

pub use consumer::*;
pub use destination::*;
pub use listener::*;
pub use puente_ports::{CommitEntry, Record};
