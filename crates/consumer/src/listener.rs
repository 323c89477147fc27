//! 消息监听器

use puente_ports::Record;

/// 每条投递的消息回调一次的监听器
///
/// 回调在 receive 调用方的执行上下文里同步执行，返回后才会提交位点。
/// 回调需要幂等：提交失败时同一条记录可能在后续调用中再次投递。
pub trait MessageListener: Send + Sync {
    /// 处理一条已投递的记录
    fn on_message(&self, record: &Record);
}

impl<F> MessageListener for F
where
    F: Fn(&Record) + Send + Sync,
{
    fn on_message(&self, record: &Record) {
        self(record)
    }
}

/// 默认监听器：什么都不做
pub(crate) struct NoopListener;

impl MessageListener for NoopListener {
    fn on_message(&self, _record: &Record) {}
}
