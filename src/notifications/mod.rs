//! Notification service for Quotewatch
//!
//! Provides push notifications via ntfy for alert events. Delivery is
//! best-effort and fire-and-forget: a failed send is logged and never
//! reverts the trigger state that produced it.

pub mod ntfy;

pub use ntfy::{NtfyConfig, NtfyNotifier};

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::models::RsiAlertKey;

/// Notification event types
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// A buy threshold fired: sampled buy price dropped to or below target
    BuyThresholdHit { price: f64, target: Decimal },
    /// A sell threshold fired: sampled sell price rose to or above target
    SellThresholdHit { price: f64, target: Decimal },
    /// An RSI alert newly triggered
    RsiThresholdHit { rsi: f64, key: RsiAlertKey },
}

impl NotificationEvent {
    /// Short title for the push message
    pub fn title(&self) -> &'static str {
        match self {
            Self::BuyThresholdHit { .. } => "Buy Price Alert",
            Self::SellThresholdHit { .. } => "Sell Price Alert",
            Self::RsiThresholdHit { .. } => "RSI Alert",
        }
    }

    /// Format the event as a notification body
    pub fn format_message(&self) -> String {
        match self {
            Self::BuyThresholdHit { price, target } => {
                format!("Buy price ${:.8} is <= target ${}", price, target)
            }
            Self::SellThresholdHit { price, target } => {
                format!("Sell price ${:.8} is >= target ${}", price, target)
            }
            Self::RsiThresholdHit { rsi, key } => {
                format!("RSI {:.2} crossed {}", rsi, key)
            }
        }
    }
}

/// Notification delivery seam, injectable for tests
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Send a notification; the returned result reports delivery only and
    /// carries no state-mutation meaning
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()>;

    /// Check if the service is enabled
    fn is_enabled(&self) -> bool;
}

/// Composite notifier that fans out to every enabled service
pub struct CompositeNotifier {
    services: Vec<Arc<dyn NotificationService>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Add a notification service
    pub fn add_service(&mut self, service: Arc<dyn NotificationService>) {
        self.services.push(service);
    }

    /// Send a notification to all enabled services, swallowing failures
    pub async fn notify(&self, event: NotificationEvent) {
        for service in &self.services {
            if service.is_enabled() {
                if let Err(e) = service.notify(event.clone()).await {
                    tracing::error!(
                        error = %e,
                        title = event.title(),
                        "Failed to send notification"
                    );
                }
            }
        }
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
