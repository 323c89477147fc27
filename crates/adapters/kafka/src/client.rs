//! rdkafka 消费端口实现

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use puente_errors::{AppError, AppResult};
use puente_ports::{CommitEntry, OffsetCommitter, Record, RecordPoller};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use crate::config::KafkaConsumerConfig;

/// Kafka 拉取客户端
///
/// 实现 [`RecordPoller`] 与 [`OffsetCommitter`] 两个端口。
/// 不支持并发访问，每个客户端同一时刻只服务一次在途调用。
pub struct KafkaPollClient {
    consumer: StreamConsumer,
    max_poll_records: usize,
}

impl KafkaPollClient {
    pub fn new(config: &KafkaConsumerConfig) -> AppResult<Self> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.to_client_config_entries() {
            client_config.set(&key, &value);
        }

        let consumer: StreamConsumer = client_config
            .create()
            .map_err(|e| AppError::broker(format!("Failed to create Kafka consumer: {}", e)))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            "Kafka poll client created"
        );

        Ok(Self {
            consumer,
            max_poll_records: config.max_poll_records,
        })
    }

    fn to_record(message: &BorrowedMessage<'_>) -> AppResult<Record> {
        let payload = match message.payload_view::<str>() {
            Some(Ok(s)) => s.to_string(),
            Some(Err(e)) => {
                return Err(AppError::internal(format!(
                    "Failed to decode message payload: {}",
                    e
                )));
            }
            None => String::new(),
        };

        let key = message
            .key_view::<str>()
            .and_then(|r| r.ok())
            .map(|s| s.to_string());

        Ok(Record {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key,
            payload,
            timestamp: message.timestamp().to_millis(),
        })
    }
}

#[async_trait]
impl RecordPoller for KafkaPollClient {
    fn subscribe(&self, topics: &[&str]) -> AppResult<()> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| AppError::broker(format!("Failed to subscribe: {}", e)))
    }

    fn unsubscribe(&self) -> AppResult<()> {
        self.consumer.unsubscribe();
        Ok(())
    }

    /// 最多等待 `max_wait` 拿第一条记录，之后只收割已就绪的消息，
    /// 直到批量上限。零预算意味着只返回已缓冲的记录。
    async fn poll(&self, max_wait: Duration) -> AppResult<Vec<Record>> {
        let mut stream = self.consumer.stream();
        let mut batch = Vec::new();

        match tokio::time::timeout(max_wait, stream.next()).await {
            Err(_elapsed) => return Ok(batch),
            Ok(None) => return Ok(batch),
            Ok(Some(Ok(message))) => batch.push(Self::to_record(&message)?),
            Ok(Some(Err(e))) => {
                return Err(AppError::broker(format!("Kafka poll failed: {}", e)));
            }
        }

        while batch.len() < self.max_poll_records {
            match stream.next().now_or_never() {
                Some(Some(Ok(message))) => batch.push(Self::to_record(&message)?),
                Some(Some(Err(e))) => {
                    return Err(AppError::broker(format!("Kafka poll failed: {}", e)));
                }
                Some(None) | None => break,
            }
        }

        debug!(records = batch.len(), "poll batch collected");
        Ok(batch)
    }

    async fn close(&self) -> AppResult<()> {
        self.consumer.unsubscribe();
        debug!("Kafka poll client released");
        Ok(())
    }
}

#[async_trait]
impl OffsetCommitter for KafkaPollClient {
    async fn commit_sync(&self, entry: &CommitEntry) -> AppResult<()> {
        let mut tpl = TopicPartitionList::new();
        // Kafka 的提交位点指向下一条待读记录，这里由已处理位点换算
        tpl.add_partition_offset(&entry.topic, entry.partition, Offset::Offset(entry.offset + 1))
            .map_err(|e| AppError::commit(format!("Invalid commit entry: {}", e)))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| AppError::commit(format!("Failed to commit offset: {}", e)))?;

        debug!(
            topic = %entry.topic,
            partition = entry.partition,
            offset = entry.offset,
            "offset committed"
        );
        Ok(())
    }
}
