//! Run report webhooks.

use super::EditionCourier;
use crate::report::RunReport;
use crate::types::Event;

impl EditionCourier {
    /// POST `report` as JSON to every configured report webhook
    ///
    /// Each webhook gets its own timeout. Failures are logged and broadcast as
    /// [`Event::ReportWebhookFailed`]; they never fail the run. Returns how
    /// many webhooks accepted the report.
    pub async fn publish_report(&self, report: &RunReport) -> usize {
        let webhooks = &self.config.notifications.report_webhooks;
        if webhooks.is_empty() {
            return 0;
        }

        let client = reqwest::Client::new();
        let mut accepted = 0;

        for webhook in webhooks {
            let mut request = client.post(&webhook.url).json(report).timeout(webhook.timeout);

            if let Some(auth) = &webhook.auth_header {
                request = request.header("Authorization", auth);
            }

            let url = webhook.url.clone();
            let failure = match tokio::time::timeout(webhook.timeout, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    tracing::debug!(url = %url, "report webhook sent successfully");
                    accepted += 1;
                    None
                }
                Ok(Ok(response)) => Some(format!(
                    "Webhook returned status {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                )),
                Ok(Err(e)) => Some(format!("Failed to send webhook: {}", e)),
                Err(_) => Some(format!("Webhook timed out after {:?}", webhook.timeout)),
            };

            if let Some(error) = failure {
                tracing::warn!(url = %url, error = %error, "report webhook failed");
                self.emit_event(Event::ReportWebhookFailed { url, error });
            }
        }

        accepted
    }
}
