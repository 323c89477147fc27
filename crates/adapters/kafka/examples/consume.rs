//! 端到端消费示例
//!
//! 需要本地 Kafka（默认 localhost:9092）：
//!
//! ```text
//! cargo run -p puente-adapter-kafka --example consume
//! ```
//!
//! 阻塞等待 `orders` topic 的下一条消息，Ctrl-C 通过关闭句柄
//! 取消等待。

use puente_adapter_kafka::{KafkaConsumerConfig, message_consumer};
use puente_config::AppConfig;
use puente_consumer::{Destination, Record};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = std::env::var("PUENTE_CONFIG_DIR")
        .unwrap_or_else(|_| "crates/adapters/kafka/config".to_string());
    let app_config = AppConfig::load(&config_dir)?;
    puente_telemetry::init_tracing(&app_config.telemetry.log_level);

    let kafka_config = KafkaConsumerConfig::from_settings(&app_config.kafka)?;
    let destination = Destination::topic("orders")?;
    let mut consumer = message_consumer(&kafka_config, destination)?;

    consumer.set_message_listener(|record: &Record| {
        info!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            payload = %record.payload,
            "message delivered"
        );
    });

    let close_handle = consumer.close_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            close_handle.close();
        }
    });

    info!("waiting for the next message on 'orders' (Ctrl-C to stop)");
    match consumer.receive().await {
        Ok(record) => info!(offset = record.offset, "receive returned"),
        Err(e) => info!(error = %e, "receive ended without a message"),
    }

    consumer.close().await?;
    Ok(())
}
