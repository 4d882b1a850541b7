pub mod api_executor;
pub mod notifier;

pub use api_executor::{ApiExecutor, LineStream};
pub use notifier::{AppEvent, Notifier, ToastLevel};
