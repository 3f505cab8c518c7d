//! Integration events: facts other bounded contexts care about, published
//! once the events behind them are persisted.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, MessageId, SubdomainId};
use domain::DeletionReason;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IntegrationEvent {
    EmailReceived {
        message_id: MessageId,
        subdomain_id: SubdomainId,
        campaign_id: Option<AggregateId>,
        received_at: DateTime<Utc>,
    },
    EmailDeleted {
        message_id: MessageId,
        reason: DeletionReason,
        deleted_at: DateTime<Utc>,
    },
    ChaosAddressUpdated {
        chaos_address_id: AggregateId,
        subdomain_id: SubdomainId,
        local_part: String,
        response_code: u16,
        enabled: bool,
        received_count: u64,
    },
    CampaignCreated {
        campaign_id: AggregateId,
        subdomain_id: SubdomainId,
        value: String,
        created_at: DateTime<Utc>,
    },
    CampaignCaptureRecorded {
        campaign_id: AggregateId,
        message_id: MessageId,
        captured_at: DateTime<Utc>,
    },
    CampaignDeleted {
        campaign_id: AggregateId,
        force: bool,
        deleted_at: DateTime<Utc>,
    },
    SubdomainSuspensionChanged {
        subdomain_id: SubdomainId,
        suspended: bool,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
}

impl IntegrationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            IntegrationEvent::EmailReceived { .. } => "EmailReceived",
            IntegrationEvent::EmailDeleted { .. } => "EmailDeleted",
            IntegrationEvent::ChaosAddressUpdated { .. } => "ChaosAddressUpdated",
            IntegrationEvent::CampaignCreated { .. } => "CampaignCreated",
            IntegrationEvent::CampaignCaptureRecorded { .. } => "CampaignCaptureRecorded",
            IntegrationEvent::CampaignDeleted { .. } => "CampaignDeleted",
            IntegrationEvent::SubdomainSuspensionChanged { .. } => "SubdomainSuspensionChanged",
        }
    }
}

#[derive(Debug, Error)]
#[error("Failed to publish {event}: {reason}")]
pub struct PublishError {
    pub event: &'static str,
    pub reason: String,
}

/// Outbound channel for integration events.
#[async_trait]
pub trait IntegrationEventPublisher: Send + Sync {
    async fn publish(&self, event: IntegrationEvent) -> Result<(), PublishError>;
}

/// Publishes each event in order. A failure is logged and counted; the
/// command that produced the events has already been persisted.
pub(crate) async fn publish_all(
    publisher: &dyn IntegrationEventPublisher,
    events: impl IntoIterator<Item = IntegrationEvent>,
) {
    for event in events {
        let name = event.name();
        match publisher.publish(event).await {
            Ok(()) => {
                metrics::counter!("integration_events_published_total", "event" => name)
                    .increment(1);
            }
            Err(e) => {
                tracing::warn!(event = name, error = %e, "integration event not published");
                metrics::counter!("integration_events_failed_total", "event" => name)
                    .increment(1);
            }
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<IntegrationEvent>,
    fail_on_publish: bool,
}

/// Publisher that keeps every event in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following publish fail until switched off.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_publish = fail;
    }

    pub fn published(&self) -> Vec<IntegrationEvent> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .clone()
    }

    /// Returns the names of the published events, in order.
    pub fn published_names(&self) -> Vec<&'static str> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .iter()
            .map(IntegrationEvent::name)
            .collect()
    }

    pub fn clear(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .clear();
    }
}

#[async_trait]
impl IntegrationEventPublisher for InMemoryPublisher {
    async fn publish(&self, event: IntegrationEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_publish {
            return Err(PublishError {
                event: event.name(),
                reason: "publisher configured to fail".to_string(),
            });
        }
        state.published.push(event);
        Ok(())
    }
}

/// Publisher that writes each event to the log as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl IntegrationEventPublisher for TracingPublisher {
    async fn publish(&self, event: IntegrationEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&event).map_err(|e| PublishError {
            event: event.name(),
            reason: e.to_string(),
        })?;
        tracing::info!(event = event.name(), %payload, "integration event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted() -> IntegrationEvent {
        IntegrationEvent::CampaignDeleted {
            campaign_id: AggregateId::new(),
            force: true,
            deleted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_publisher_records_in_order() {
        let publisher = InMemoryPublisher::new();
        publish_all(
            &publisher,
            [
                deleted(),
                IntegrationEvent::SubdomainSuspensionChanged {
                    subdomain_id: SubdomainId::new(),
                    suspended: true,
                    reason: None,
                    at: Utc::now(),
                },
            ],
        )
        .await;
        assert_eq!(
            publisher.published_names(),
            vec!["CampaignDeleted", "SubdomainSuspensionChanged"]
        );
    }

    #[tokio::test]
    async fn failing_publisher_is_swallowed() {
        let publisher = InMemoryPublisher::new();
        publisher.set_fail_on_publish(true);
        publish_all(&publisher, [deleted()]).await;
        assert!(publisher.published().is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(deleted()).unwrap();
        assert_eq!(json["type"], "CampaignDeleted");
        assert_eq!(json["data"]["force"], true);
    }
}
