use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::model::EvaluatedTarget;
use crate::notifier::{Alert, Notifier};
use crate::storage::NotificationLog;

/// What happened to one target during notification dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Distance missing or outside the tolerance band.
    Idle,
    /// Already notified today.
    Suppressed,
    /// Within tolerance but no push channel is configured.
    Disabled,
    Sent,
    /// Delivery failed; the next run may retry.
    Failed,
}

/// Whether `distance` is within the tolerance band around the price level.
pub fn is_triggered(distance: Option<f64>, tolerance: f64) -> bool {
    distance.is_some_and(|d| d.abs() <= tolerance)
}

/// Send at most one alert per target per day.
///
/// The log is updated only after a successful delivery.
pub async fn dispatch(
    targets: &[EvaluatedTarget],
    log: &mut NotificationLog,
    notifier: Option<&dyn Notifier>,
    today: NaiveDate,
    tolerance: f64,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(targets.len());
    for evaluated in targets {
        let outcome = dispatch_one(evaluated, log, notifier, today, tolerance).await;
        outcomes.push(outcome);
    }
    outcomes
}

async fn dispatch_one(
    evaluated: &EvaluatedTarget,
    log: &mut NotificationLog,
    notifier: Option<&dyn Notifier>,
    today: NaiveDate,
    tolerance: f64,
) -> Outcome {
    let id = evaluated.target.id.as_str();

    if !is_triggered(evaluated.level_distance, tolerance) {
        return Outcome::Idle;
    }

    if log.notified_on(id, today) {
        debug!(target_id = id, "alert suppressed, already notified today");
        return Outcome::Suppressed;
    }

    let Some(notifier) = notifier else {
        info!(target_id = id, "target reached but push channel is disabled");
        return Outcome::Disabled;
    };

    let alert = Alert::for_target(evaluated);
    match notifier.notify(&alert).await {
        Ok(()) => {
            log.record(id, today);
            info!(target_id = id, channel = notifier.name(), "alert sent");
            Outcome::Sent
        }
        Err(e) => {
            warn!(error = ?e, target_id = id, channel = notifier.name(), "alert delivery failed");
            Outcome::Failed
        }
    }
}
