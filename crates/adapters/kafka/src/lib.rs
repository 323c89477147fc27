//! puente-adapter-kafka - Kafka 适配器
//!
//! 用 rdkafka 实现消费端口：
//! - 订阅 / 拉取（StreamConsumer，带等待预算的批量 poll）
//! - 同步位点提交（手动提交，禁用 auto commit）
//! - 配置（SASL、透传属性）

mod client;
mod config;

pub use client::*;
pub use config::*;

use puente_consumer::{Destination, MessageConsumer};
use puente_errors::AppResult;

/// 构建指向 `destination` 的点对点消费句柄
///
/// 对外的构造入口：由配置创建底层 Kafka 客户端并包装成
/// [`MessageConsumer`]。
pub fn message_consumer(
    config: &KafkaConsumerConfig,
    destination: Destination,
) -> AppResult<MessageConsumer<KafkaPollClient>> {
    let client = KafkaPollClient::new(config)?;
    Ok(MessageConsumer::new(client, destination).with_poll_slice(config.poll_slice))
}
