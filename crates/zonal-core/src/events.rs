//! 区域事件总线
//!
//! 管理器在集合变化时广播事件，渲染层、提示框等外部协作者订阅后
//! 自行处理。订阅端断开后会在下一次广播时被清理。

use crate::zone::ZoneId;
use futures::channel::mpsc;

/// 事件类型
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneEvent {
    Created { ids: Vec<ZoneId> },
    Updated { ids: Vec<ZoneId> },
    Deleted { ids: Vec<ZoneId> },
    /// 需要展示给发起操作的用户的提示
    Notice { level: NoticeLevel, message: String },
    /// 持久化失败，内存状态保留
    PersistenceFailed { ids: Vec<ZoneId>, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// 事件总线
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<(String, mpsc::UnboundedSender<ZoneEvent>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅事件
    pub fn subscribe(
        &mut self,
        subscriber_id: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<ZoneEvent> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push((subscriber_id.into(), sender));
        receiver
    }

    /// 取消订阅
    pub fn unsubscribe(&mut self, subscriber_id: &str) {
        self.subscribers.retain(|(id, _)| id != subscriber_id);
    }

    /// 广播事件（不阻塞）
    pub fn publish(&mut self, event: ZoneEvent) {
        self.subscribers
            .retain(|(_, sender)| sender.unbounded_send(event.clone()).is_ok());
    }

    pub fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.publish(ZoneEvent::Notice {
            level,
            message: message.into(),
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
