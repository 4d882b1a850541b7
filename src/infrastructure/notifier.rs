//! 事件总线 - 基础设施层
//!
//! 替代全局的 toast / `auth:logout` 事件派发：由调用方显式注入，
//! 界面或日志订阅者通过 `subscribe()` 接收。
//!
//! | 事件 | 触发方 | 载荷 |
//! |------|--------|------|
//! | `Toast` | 上传失败、请求失败、校验提示 | 级别 + 文案 |
//! | `AuthLogout` | 任意请求返回 401 | 原因 |
//! | `FileFailed` | 单份答卷评测失败 | 资源ID + 原因 |

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    Toast { level: ToastLevel, message: String },
    AuthLogout { reason: String },
    FileFailed { resource_id: String, reason: String },
}

/// 事件总线
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<AppEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// 发布事件；没有订阅者时直接丢弃
    pub fn publish(&self, event: AppEvent) {
        if self.sender.send(event).is_err() {
            debug!("事件总线暂无订阅者");
        }
    }

    pub fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.publish(AppEvent::Toast {
            level,
            message: message.into(),
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
