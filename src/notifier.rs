pub mod chat;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotifyError;
use crate::model::Trigger;

/// Sink for trigger notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, trigger: Trigger) -> BoxFuture<'_, Result<(), Report<NotifyError>>>;
}
