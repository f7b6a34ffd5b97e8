use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Fire-and-forget merchant notification channel. Implementations must
/// swallow and log their own failures; an undeliverable alert is never
/// fatal to the authentication flow.
#[async_trait]
pub trait MerchantAlert: Send + Sync {
    async fn send_alert(&self, merchant_id: &str, priority: AlertPriority, reason: &str, details: &str);
}

/// Default sink: structured log only. Deployments plug in a real channel
/// (webhook, queue) at the boundary.
pub struct LogAlert;

#[async_trait]
impl MerchantAlert for LogAlert {
    async fn send_alert(
        &self,
        merchant_id: &str,
        priority: AlertPriority,
        reason: &str,
        details: &str,
    ) {
        warn!(merchant_id = %merchant_id, ?priority, reason = %reason, details = %details, "merchant alert");
    }
}
