use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotifyError;
use crate::notifier::{Alert, Notifier};

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn name(&self) -> &str {
        "terminal"
    }

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<(), Report<NotifyError>>> {
        tracing::warn!(
            target_id = %alert.target_id,
            title = %alert.title,
            "ALERT: {}",
            alert.content,
        );
        Box::pin(async { Ok(()) })
    }
}
