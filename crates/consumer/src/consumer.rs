//! 消费句柄：订阅生命周期 + 阻塞接收 + 投递与提交
//!
//! 底层客户端只有“拉一批已就绪记录”和“显式提交”两个原语，
//! 这里把它们组合成点对点语义：
//! - 订阅只存在于单次 receive 尝试的窗口内，尝试结束即清空
//! - 无限等待用有界时间片轮询模拟，并可被 [`CloseHandle`] 取消
//! - 每次调用最多投递一条记录，监听器返回后、调用返回前提交位点

use std::time::Duration;

use puente_errors::{AppError, AppResult};
use puente_ports::{CommitEntry, OffsetCommitter, Record, RecordPoller};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::destination::Destination;
use crate::listener::{MessageListener, NoopListener};

/// 无限等待模式下单次 poll 的默认时间片
pub const DEFAULT_POLL_SLICE: Duration = Duration::from_millis(100);

/// 可跨任务触发的关闭句柄
///
/// 调用 [`CloseHandle::close`] 会取消挂起的无限等待 receive，
/// 使其以 `AppError::Closed` 返回。
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    /// 请求关闭，唤醒正在阻塞的 receive
    pub fn close(&self) {
        self.token.cancel();
    }
}

/// 点对点消费句柄
///
/// 独占底层客户端。receive / 设置监听器 / close 都要求 `&mut self`，
/// “同一时刻至多一次在途调用”由借用检查器保证，不需要内部加锁。
pub struct MessageConsumer<C> {
    client: C,
    destination: Destination,
    listener: Box<dyn MessageListener>,
    poll_slice: Duration,
    shutdown: CancellationToken,
    closed: bool,
}

impl<C> MessageConsumer<C>
where
    C: RecordPoller + OffsetCommitter,
{
    /// 包装一个底层客户端
    pub fn new(client: C, destination: Destination) -> Self {
        info!(topic = %destination.name(), "message consumer created");
        Self {
            client,
            destination,
            listener: Box::new(NoopListener),
            poll_slice: DEFAULT_POLL_SLICE,
            shutdown: CancellationToken::new(),
            closed: false,
        }
    }

    /// 调整无限等待模式的轮询时间片
    pub fn with_poll_slice(mut self, poll_slice: Duration) -> Self {
        self.poll_slice = poll_slice;
        self
    }

    /// 消费的目的地
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// 当前监听器
    pub fn message_listener(&self) -> &dyn MessageListener {
        self.listener.as_ref()
    }

    /// 替换监听器，只影响后续投递
    pub fn set_message_listener(&mut self, listener: impl MessageListener + 'static) {
        self.listener = Box::new(listener);
    }

    /// 获取关闭句柄，可从其他任务取消阻塞中的 receive
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            token: self.shutdown.clone(),
        }
    }

    /// 阻塞直到收到一条消息
    ///
    /// 反复以 [`poll_slice`](Self::with_poll_slice) 为预算拉取，
    /// 直到拿到目的地的记录，或被 close 取消（返回 `AppError::Closed`）。
    /// 永远不会返回“没有消息”。
    pub async fn receive(&mut self) -> AppResult<Record> {
        self.ensure_open()?;
        self.subscribe()?;
        let result = self.wait_for_record().await;
        self.finish_attempt(result)
    }

    /// 最多等待 `timeout`，恰好向底层客户端发起一次 poll
    ///
    /// 时限内没有目的地的记录时返回 `Ok(None)`。
    pub async fn receive_timeout(&mut self, timeout: Duration) -> AppResult<Option<Record>> {
        self.ensure_open()?;
        self.subscribe()?;
        let result = self.poll_once(timeout).await;
        self.finish_attempt(result)
    }

    /// 立即返回：单次零预算 poll，等价于 `receive_timeout(Duration::ZERO)`
    pub async fn receive_no_wait(&mut self) -> AppResult<Option<Record>> {
        self.receive_timeout(Duration::ZERO).await
    }

    /// 显式提交接口，保留用于兼容点对点 API；实际提交都发生在投递内部
    pub fn commit(&self) {}

    /// 关闭句柄：取消挂起的 receive，尽力清订阅，释放底层客户端
    ///
    /// 幂等。关闭后所有 receive 变体都返回 `AppError::Closed`。
    pub async fn close(&mut self) -> AppResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shutdown.cancel();

        if let Err(e) = self.unsubscribe() {
            warn!(error = %e, "unsubscribe during close failed");
        }
        self.client.close().await?;

        info!(topic = %self.destination.name(), "message consumer closed");
        Ok(())
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed || self.shutdown.is_cancelled() {
            return Err(AppError::closed("message consumer is closed"));
        }
        Ok(())
    }

    fn subscribe(&self) -> AppResult<()> {
        self.client.subscribe(&[self.destination.name()])
    }

    fn unsubscribe(&self) -> AppResult<()> {
        self.client.unsubscribe()
    }

    /// 每次 receive 尝试都以清空订阅收尾，订阅不跨调用存活
    fn finish_attempt<T>(&self, result: AppResult<T>) -> AppResult<T> {
        let unsubscribed = self.unsubscribe();
        match result {
            Ok(value) => {
                unsubscribed?;
                Ok(value)
            }
            Err(e) => {
                if let Err(unsub_err) = unsubscribed {
                    warn!(error = %unsub_err, "unsubscribe after failed receive also failed");
                }
                Err(e)
            }
        }
    }

    async fn wait_for_record(&self) -> AppResult<Record> {
        loop {
            let batch = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(topic = %self.destination.name(), "blocking receive cancelled by close");
                    return Err(AppError::closed("receive cancelled by close"));
                }
                batch = self.client.poll(self.poll_slice) => batch?,
            };

            if let Some(record) = self.deliver_first(batch).await? {
                return Ok(record);
            }
        }
    }

    async fn poll_once(&self, timeout: Duration) -> AppResult<Option<Record>> {
        let batch = self.client.poll(timeout).await?;
        self.deliver_first(batch).await
    }

    /// 投递批内属于目的地的第一条记录：先回调监听器，再同步提交位点
    ///
    /// 同批剩余的目的地记录会被丢弃且不提交，这沿用了被适配 API 的
    /// 单条投递语义；丢弃时记 WARN。
    async fn deliver_first(&self, batch: Vec<Record>) -> AppResult<Option<Record>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let total = batch.len();
        let mut matching = batch
            .into_iter()
            .filter(|r| r.topic == self.destination.name());

        let Some(record) = matching.next() else {
            debug!(
                topic = %self.destination.name(),
                total,
                "poll batch held no records for destination"
            );
            return Ok(None);
        };

        let surplus = matching.count();
        if surplus > 0 {
            warn!(
                topic = %record.topic,
                surplus,
                "dropping surplus records from batch without committing them"
            );
        }

        self.listener.on_message(&record);

        let entry = CommitEntry::for_record(&record);
        self.client.commit_sync(&entry).await?;

        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "record delivered and offset committed"
        );
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ClientCall {
        Subscribe(Vec<String>),
        Unsubscribe,
        Poll(Duration),
        Commit(CommitEntry),
        Close,
    }

    /// 脚本化的底层客户端：poll 按队列逐批吐出，记录全部调用顺序
    #[derive(Default)]
    struct FakeClient {
        batches: Arc<Mutex<VecDeque<Vec<Record>>>>,
        calls: Arc<Mutex<Vec<ClientCall>>>,
        /// 与监听器共享的事件序列，用于断言回调先于提交
        events: Arc<Mutex<Vec<String>>>,
        fail_commit: Arc<AtomicBool>,
        fail_poll: Arc<AtomicBool>,
        /// 队列空时模拟底层客户端在预算内等待
        sleep_on_empty: bool,
    }

    impl FakeClient {
        fn push(&self, call: ClientCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl RecordPoller for FakeClient {
        fn subscribe(&self, topics: &[&str]) -> AppResult<()> {
            self.push(ClientCall::Subscribe(
                topics.iter().map(|t| t.to_string()).collect(),
            ));
            Ok(())
        }

        fn unsubscribe(&self) -> AppResult<()> {
            self.push(ClientCall::Unsubscribe);
            Ok(())
        }

        async fn poll(&self, max_wait: Duration) -> AppResult<Vec<Record>> {
            self.push(ClientCall::Poll(max_wait));
            if self.fail_poll.load(Ordering::SeqCst) {
                return Err(AppError::broker("poll failed"));
            }
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => Ok(batch),
                None => {
                    if self.sleep_on_empty && !max_wait.is_zero() {
                        tokio::time::sleep(max_wait).await;
                    }
                    Ok(Vec::new())
                }
            }
        }

        async fn close(&self) -> AppResult<()> {
            self.push(ClientCall::Close);
            Ok(())
        }
    }

    #[async_trait]
    impl OffsetCommitter for FakeClient {
        async fn commit_sync(&self, entry: &CommitEntry) -> AppResult<()> {
            self.push(ClientCall::Commit(entry.clone()));
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(AppError::commit("commit refused"));
            }
            self.events.lock().unwrap().push(format!(
                "commit:{}:{}:{}",
                entry.topic, entry.partition, entry.offset
            ));
            Ok(())
        }
    }

    struct Harness {
        batches: Arc<Mutex<VecDeque<Vec<Record>>>>,
        calls: Arc<Mutex<Vec<ClientCall>>>,
        events: Arc<Mutex<Vec<String>>>,
        fail_commit: Arc<AtomicBool>,
        fail_poll: Arc<AtomicBool>,
    }

    fn consumer_for(
        topic: &str,
        batches: Vec<Vec<Record>>,
    ) -> (MessageConsumer<FakeClient>, Harness) {
        consumer_with(topic, batches, false)
    }

    fn consumer_with(
        topic: &str,
        batches: Vec<Vec<Record>>,
        sleep_on_empty: bool,
    ) -> (MessageConsumer<FakeClient>, Harness) {
        let client = FakeClient {
            batches: Arc::new(Mutex::new(batches.into())),
            sleep_on_empty,
            ..FakeClient::default()
        };
        let harness = Harness {
            batches: client.batches.clone(),
            calls: client.calls.clone(),
            events: client.events.clone(),
            fail_commit: client.fail_commit.clone(),
            fail_poll: client.fail_poll.clone(),
        };
        let consumer = MessageConsumer::new(client, Destination::topic(topic).unwrap())
            .with_poll_slice(Duration::from_millis(10));
        (consumer, harness)
    }

    fn record(topic: &str, partition: i32, offset: i64, payload: &str) -> Record {
        Record {
            topic: topic.to_string(),
            partition,
            offset,
            key: None,
            payload: payload.to_string(),
            timestamp: None,
        }
    }

    /// 记录投递顺序的监听器
    fn recording_listener(events: Arc<Mutex<Vec<String>>>) -> impl MessageListener {
        move |r: &Record| {
            events.lock().unwrap().push(format!("listener:{}", r.payload));
        }
    }

    #[tokio::test]
    async fn test_bounded_receive_delivers_commits_and_unsubscribes() {
        let (mut consumer, h) = consumer_for("orders", vec![vec![record("orders", 0, 7, "M")]]);
        consumer.set_message_listener(recording_listener(h.events.clone()));

        let msg = consumer
            .receive_timeout(Duration::from_millis(1000))
            .await
            .unwrap()
            .expect("record should be delivered");
        assert_eq!(msg.payload, "M");

        // 监听器返回后才提交，提交恰好一次
        let events = h.events.lock().unwrap().clone();
        assert_eq!(events, vec!["listener:M", "commit:orders:0:7"]);

        let calls = h.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ClientCall::Subscribe(vec!["orders".to_string()]),
                ClientCall::Poll(Duration::from_millis(1000)),
                ClientCall::Commit(CommitEntry::new("orders", 0, 7)),
                ClientCall::Unsubscribe,
            ]
        );
    }

    #[tokio::test]
    async fn test_indefinite_receive_skips_empty_polls() {
        let (mut consumer, h) = consumer_for(
            "orders",
            vec![vec![], vec![], vec![record("orders", 1, 42, "late")]],
        );

        let msg = consumer.receive().await.unwrap();
        assert_eq!(msg.offset, 42);

        let polls = h
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, ClientCall::Poll(_)))
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn test_indefinite_receive_ignores_other_topics() {
        let (mut consumer, h) = consumer_for(
            "orders",
            vec![
                vec![record("audit", 0, 3, "X")],
                vec![record("orders", 0, 7, "M")],
            ],
        );

        let msg = consumer.receive().await.unwrap();
        assert_eq!(msg.payload, "M");

        // 无关 topic 的记录既不投递也不提交
        let commits: Vec<_> = h
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                ClientCall::Commit(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(commits, vec![CommitEntry::new("orders", 0, 7)]);
    }

    #[tokio::test]
    async fn test_subscription_cleared_after_every_attempt() {
        let (mut consumer, h) = consumer_for("orders", vec![vec![record("orders", 0, 1, "a")]]);
        consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(
            h.calls.lock().unwrap().last(),
            Some(&ClientCall::Unsubscribe)
        );

        // 空结果的尝试同样清空订阅
        consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(
            h.calls.lock().unwrap().last(),
            Some(&ClientCall::Unsubscribe)
        );
    }

    #[tokio::test]
    async fn test_mixed_topic_batch_delivers_destination_only() {
        let (mut consumer, h) = consumer_for(
            "orders",
            vec![vec![
                record("audit", 0, 3, "X"),
                record("orders", 0, 7, "M"),
            ]],
        );
        consumer.set_message_listener(recording_listener(h.events.clone()));

        let msg = consumer
            .receive_timeout(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, "M");

        let events = h.events.lock().unwrap().clone();
        assert_eq!(events, vec!["listener:M", "commit:orders:0:7"]);
    }

    #[tokio::test]
    async fn test_multi_record_batch_commits_first_only() {
        let (mut consumer, h) = consumer_for(
            "orders",
            vec![vec![
                record("orders", 0, 7, "M"),
                record("orders", 0, 8, "N"),
            ]],
        );
        consumer.set_message_listener(recording_listener(h.events.clone()));

        let msg = consumer
            .receive_timeout(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.offset, 7);

        // 同批第二条被丢弃：不回调、不提交
        let events = h.events.lock().unwrap().clone();
        assert_eq!(events, vec!["listener:M", "commit:orders:0:7"]);
    }

    #[tokio::test]
    async fn test_no_wait_is_single_zero_budget_poll() {
        let (mut consumer, h) = consumer_with("orders", vec![], true);

        let msg = consumer.receive_no_wait().await.unwrap();
        assert!(msg.is_none());

        let calls = h.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ClientCall::Subscribe(vec!["orders".to_string()]),
                ClientCall::Poll(Duration::ZERO),
                ClientCall::Unsubscribe,
            ]
        );
    }

    #[tokio::test]
    async fn test_listener_swap_applies_to_subsequent_receives_only() {
        let (mut consumer, h) = consumer_for(
            "orders",
            vec![
                vec![record("orders", 0, 1, "first")],
                vec![record("orders", 0, 2, "second")],
            ],
        );

        // 第一次投递走默认 noop 监听器
        consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(
            h.events.lock().unwrap().clone(),
            vec!["commit:orders:0:1"]
        );

        consumer.set_message_listener(recording_listener(h.events.clone()));
        consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(
            h.events.lock().unwrap().clone(),
            vec!["commit:orders:0:1", "listener:second", "commit:orders:0:2"]
        );
    }

    #[tokio::test]
    async fn test_default_noop_listener_still_commits() {
        let (mut consumer, h) = consumer_for("orders", vec![vec![record("orders", 0, 9, "M")]]);

        let msg = consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap();
        assert!(msg.is_some());
        assert_eq!(h.events.lock().unwrap().clone(), vec!["commit:orders:0:9"]);

        // getter 返回的默认监听器可以直接调用，没有任何副作用
        consumer
            .message_listener()
            .on_message(&record("orders", 0, 10, "ignored"));
        assert_eq!(h.events.lock().unwrap().clone(), vec!["commit:orders:0:9"]);
    }

    #[tokio::test]
    async fn test_commit_failure_surfaces_after_listener_ran() {
        let (mut consumer, h) = consumer_for("orders", vec![vec![record("orders", 0, 7, "M")]]);
        consumer.set_message_listener(recording_listener(h.events.clone()));
        h.fail_commit.store(true, Ordering::SeqCst);

        let err = consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Commit(_)));

        // 监听器已经执行过，订阅仍被清空
        assert_eq!(h.events.lock().unwrap().clone(), vec!["listener:M"]);
        assert_eq!(
            h.calls.lock().unwrap().last(),
            Some(&ClientCall::Unsubscribe)
        );

        // 位点未提交，同一条记录可能再次投递（重复回调）
        h.fail_commit.store(false, Ordering::SeqCst);
        h.batches
            .lock()
            .unwrap()
            .push_back(vec![record("orders", 0, 7, "M")]);
        let msg = consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.offset, 7);
        assert_eq!(
            h.events.lock().unwrap().clone(),
            vec!["listener:M", "listener:M", "commit:orders:0:7"]
        );
    }

    #[tokio::test]
    async fn test_poll_error_propagates_and_unsubscribes() {
        let (mut consumer, h) = consumer_for("orders", vec![]);
        h.fail_poll.store(true, Ordering::SeqCst);

        let err = consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Broker(_)));
        assert_eq!(
            h.calls.lock().unwrap().last(),
            Some(&ClientCall::Unsubscribe)
        );
    }

    #[tokio::test]
    async fn test_close_then_receive_fails_closed() {
        let (mut consumer, h) = consumer_for("orders", vec![]);
        consumer.close().await.unwrap();
        assert!(h.calls.lock().unwrap().contains(&ClientCall::Close));

        let err = consumer.receive().await.unwrap_err();
        assert!(matches!(err, AppError::Closed(_)));
        let err = consumer
            .receive_timeout(Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Closed(_)));
        let err = consumer.receive_no_wait().await.unwrap_err();
        assert!(matches!(err, AppError::Closed(_)));

        // close 幂等
        consumer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_handle_unblocks_indefinite_receive() {
        let (mut consumer, _h) = consumer_with("orders", vec![], true);
        let handle = consumer.close_handle();

        let pending = tokio::spawn(async move { consumer.receive().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.close();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::Closed(_)));
    }

    #[tokio::test]
    async fn test_explicit_commit_is_noop() {
        let (consumer, h) = consumer_for("orders", vec![]);
        consumer.commit();
        assert!(h.calls.lock().unwrap().is_empty());
    }
}
