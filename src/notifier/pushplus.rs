use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::NotifyError;
use crate::notifier::{Alert, Notifier};

/// PushPlus reports success in the body, not the HTTP status.
const PUSHPLUS_OK: i64 = 200;

pub struct PushPlusNotifier {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl PushPlusNotifier {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    /// Build a notifier with the access key read from the environment
    /// variable `token_env`.
    pub fn from_env(
        client: reqwest::Client,
        endpoint: &str,
        token_env: &str,
    ) -> Result<Self, Report<NotifyError>> {
        let token = std::env::var(token_env)
            .ok()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Report::new(NotifyError::Config {
                    reason: format!("environment variable {token_env} is not set"),
                })
            })?;
        Ok(Self::new(client, endpoint, token))
    }
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    token: &'a str,
    title: &'a str,
    content: &'a str,
    template: &'a str,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

fn check_response(response: &PushResponse) -> Result<(), Report<NotifyError>> {
    if response.code == PUSHPLUS_OK {
        return Ok(());
    }
    Err(Report::new(NotifyError::Rejected {
        reason: format!(
            "code {}: {}",
            response.code,
            response.msg.as_deref().unwrap_or("no message")
        ),
    }))
}

impl Notifier for PushPlusNotifier {
    fn name(&self) -> &str {
        "pushplus"
    }

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<(), Report<NotifyError>>> {
        let alert = alert.clone();
        Box::pin(async move {
            let request = PushRequest {
                token: &self.token,
                title: &alert.title,
                content: &alert.content,
                template: "html",
            };

            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .change_context(NotifyError::Delivery)?;

            if !response.status().is_success() {
                return Err(Report::new(NotifyError::Delivery)
                    .attach(format!("HTTP status: {}", response.status())));
            }

            let body: PushResponse = response.json().await.change_context(NotifyError::Delivery)?;
            check_response(&body)?;

            info!(target_id = %alert.target_id, "push notification delivered");
            Ok(())
        })
    }
}
