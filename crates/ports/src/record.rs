//! 拉取记录与提交条目

/// 一次 poll 产出的记录
///
/// 只在单次投递期间存活，投递完成后即丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Topic
    pub topic: String,
    /// 分区
    pub partition: i32,
    /// 偏移量
    pub offset: i64,
    /// 消息键
    pub key: Option<String>,
    /// 消息内容
    pub payload: String,
    /// 时间戳
    pub timestamp: Option<i64>,
}

/// 单条提交请求：(topic, partition) → 已处理记录的偏移量
///
/// `offset` 是被投递记录自身的偏移量，换算成底层客户端的
/// 提交位点约定（如 Kafka 的“下一条待读”）由适配器负责。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl CommitEntry {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }

    /// 从记录构建提交条目
    pub fn for_record(record: &Record) -> Self {
        Self::new(record.topic.clone(), record.partition, record.offset)
    }
}
