pub mod pushplus;
pub mod terminal;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotifyError;
use crate::model::EvaluatedTarget;

/// A push message announcing that a target price was reached.
#[derive(Debug, Clone)]
pub struct Alert {
    pub target_id: String,
    pub title: String,
    pub content: String,
}

impl Alert {
    pub fn for_target(evaluated: &EvaluatedTarget) -> Self {
        let target = &evaluated.target;
        let current = evaluated
            .result
            .current_price()
            .map_or_else(|| "N/A".to_owned(), |p| format!("{p:.3}"));
        let level = target
            .target_price
            .map_or_else(|| "N/A".to_owned(), |p| format!("{:.4}", p.abs()));
        let ratio = evaluated
            .level_distance
            .map_or_else(|| "N/A".to_owned(), |r| format!("{:.2}%", r * 100.0));

        Self {
            target_id: target.id.clone(),
            title: format!("{} reached its target price", target.name),
            content: format!(
                "{} ({}): current {current}, target {level}, deviation {ratio}. {}",
                target.name, target.id, target.note
            )
            .trim_end()
            .to_owned(),
        }
    }
}

/// Sink for target alerts.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<(), Report<NotifyError>>>;
}
