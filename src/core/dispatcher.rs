use crate::domain::model::{ChatId, DeliveryReport, Listing};
use crate::domain::ports::Notifier;
use std::time::Duration;

pub const DEFAULT_PACING: Duration = Duration::from_millis(40);

/// Fans new listings out to every subscriber.
///
/// A failed send is logged and skipped; it never aborts the rest of the
/// broadcast and never makes the listing count as unprocessed.
pub struct NotificationDispatcher<N: Notifier> {
    notifier: N,
    pacing: Duration,
}

impl<N: Notifier> NotificationDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            pacing: DEFAULT_PACING,
        }
    }

    /// Delay between two consecutive sends.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn broadcast(&self, listings: &[Listing], subscribers: &[ChatId]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for &chat_id in subscribers {
            for listing in listings {
                if report.attempted > 0 && !self.pacing.is_zero() {
                    tokio::time::sleep(self.pacing).await;
                }

                report.attempted += 1;
                let text = format_listing(listing);
                match self.notifier.send(chat_id, &text).await {
                    Ok(()) => {
                        report.delivered += 1;
                        tracing::debug!(chat_id = %chat_id, listing_id = %listing.id, "Listing delivered");
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            chat_id = %chat_id,
                            listing_id = %listing.id,
                            error = %e,
                            "Delivery failed, continuing with remaining recipients"
                        );
                    }
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                "📨 Broadcast finished: {} attempted, {} delivered, {} failed",
                report.attempted,
                report.delivered,
                report.failed
            );
        }

        report
    }
}

/// Chat message body for one listing.
pub fn format_listing(listing: &Listing) -> String {
    let mut lines = Vec::with_capacity(3);
    lines.push(format!(
        "🏠 {}",
        listing.title.as_deref().unwrap_or("New listing")
    ));
    if let Some(price) = listing.price.as_deref() {
        lines.push(format!("💰 {}", price));
    }
    lines.push(listing.link.clone());
    lines.join("\n")
}
