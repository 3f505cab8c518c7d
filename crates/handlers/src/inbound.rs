//! Routing of inbound SMTP deliveries.
//!
//! The SMTP front end parses the message and resolves the recipient to a
//! domain, subdomain and local part; `deliver` decides the reply and
//! records what happened.

use std::fmt;
use std::sync::Arc;

use common::{AggregateId, DomainId, MessageId, SubdomainId};
use domain::{
    Campaign, DeletionReason, MAX_CAMPAIGN_VALUE_LEN, Repository, Subdomain, derive_campaign_id,
};
use event_store::EventStore;
use projections::ChaosAddressesView;
use tokio_util::sync::CancellationToken;

use crate::campaign::{CampaignHandler, RecordCapture};
use crate::chaos::ChaosAddressHandler;
use crate::context::HandlerContext;
use crate::email::{EmailHandler, ReceiveEmail};
use crate::outcome::{CommandOutcome, ErrorCode};

/// Headers that carry a campaign value, in lookup order.
pub const CAMPAIGN_HEADERS: [&str; 3] = ["X-Campaign-Id", "X-Campaign", "X-Mailgun-Campaign-Id"];

/// A recipient the SMTP front end has matched to a subdomain.
#[derive(Debug, Clone)]
pub struct ResolvedRecipient {
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
}

/// A parsed message for one resolved recipient.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub sender: String,
    pub recipient: ResolvedRecipient,
    /// Every envelope recipient, as received.
    pub recipients: Vec<String>,
    pub subject: String,
    pub headers: Vec<(String, String)>,
    pub size_bytes: u64,
}

/// The reply sent back to the SMTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    pub fn accepted() -> Self {
        Self::new(250, "2.0.0 Ok: queued")
    }

    pub fn subdomain_suspended() -> Self {
        Self::new(550, "5.7.1 Mailbox unavailable: subdomain suspended")
    }

    pub fn local_error() -> Self {
        Self::new(451, "4.3.0 Requested action aborted: local error in processing")
    }

    pub fn chaos(code: u16) -> Self {
        let class = if code < 500 { 4 } else { 5 };
        Self::new(code, format!("{class}.0.0 Simulated failure"))
    }

    pub fn is_accepted(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

/// Returns the campaign value carried by the headers, if any.
///
/// Header names compare case-insensitively and values are trimmed. Blank
/// values and values longer than a campaign value may be are ignored.
pub fn campaign_value(headers: &[(String, String)]) -> Option<&str> {
    CAMPAIGN_HEADERS.iter().find_map(|wanted| {
        headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty() && value.chars().count() <= MAX_CAMPAIGN_VALUE_LEN)
    })
}

pub struct InboundMailHandler<S: EventStore> {
    subdomains: Repository<S, Subdomain>,
    campaign_streams: Repository<S, Campaign>,
    chaos_addresses: ChaosAddressesView,
    chaos: ChaosAddressHandler<S>,
    emails: EmailHandler<S>,
    campaigns: Arc<CampaignHandler<S>>,
}

impl<S: EventStore + Clone> InboundMailHandler<S> {
    pub fn new(
        context: HandlerContext<S>,
        chaos_addresses: ChaosAddressesView,
        campaigns: Arc<CampaignHandler<S>>,
    ) -> Self {
        Self {
            subdomains: context.repository(),
            campaign_streams: context.repository(),
            chaos_addresses,
            chaos: ChaosAddressHandler::new(context.clone()),
            emails: EmailHandler::new(context),
            campaigns,
        }
    }

    /// Decides the reply for one message and records it.
    ///
    /// A suspended subdomain refuses with 550. An enabled chaos address
    /// answers with its configured code. Anything else is stored and
    /// accepted, and captured into its campaign when it carries one. Mail
    /// tagged with a campaign that has already been deleted is accepted
    /// and then deleted along with it.
    #[tracing::instrument(
        skip(self, message, cancel),
        fields(
            message_id = %message.message_id,
            subdomain_id = %message.recipient.subdomain_id,
            local_part = %message.recipient.local_part,
        )
    )]
    pub async fn deliver(&self, message: InboundMessage, cancel: &CancellationToken) -> SmtpReply {
        let recipient = &message.recipient;

        match self.subdomains.load(recipient.subdomain_id.into()).await {
            Ok(Some(subdomain)) if subdomain.is_suspended() => {
                tracing::info!("refused: subdomain suspended");
                return record(SmtpReply::subdomain_suspended(), "suspended");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "could not load subdomain");
                return record(SmtpReply::local_error(), "deferred");
            }
        }

        if let Some(address) = self
            .chaos_addresses
            .find_by_address(recipient.subdomain_id, &recipient.local_part)
            .await
            .filter(|address| address.is_enabled())
        {
            self.record_chaos_receive(address.id).await;
            metrics::counter!("chaos_rejections_total", "code" => address.response_code.to_string())
                .increment(1);
            tracing::info!(code = address.response_code, "answered by chaos address");
            return record(SmtpReply::chaos(address.response_code), "chaos");
        }

        let campaign = campaign_value(&message.headers)
            .map(|value| (value.to_string(), derive_campaign_id(recipient.subdomain_id, value)));

        let stored = self
            .emails
            .receive(
                ReceiveEmail {
                    message_id: message.message_id,
                    domain_id: recipient.domain_id,
                    subdomain_id: recipient.subdomain_id,
                    sender: message.sender.clone(),
                    recipients: message.recipients.clone(),
                    subject: message.subject.clone(),
                    size_bytes: message.size_bytes,
                    campaign_id: campaign.as_ref().map(|(_, id)| *id),
                },
                cancel,
            )
            .await;
        if let Some(code) = failure(&stored) {
            tracing::error!(%code, "message could not be stored");
            return record(SmtpReply::local_error(), "deferred");
        }

        if let Some((value, campaign_id)) = campaign {
            let capture = RecordCapture {
                domain_id: recipient.domain_id,
                subdomain_id: recipient.subdomain_id,
                value,
                message_id: message.message_id,
            };
            let outcome = self.campaigns.record_capture(capture, cancel).await;
            if outcome.error_code() == Some(ErrorCode::CampaignAlreadyDeleted) {
                self.withdraw_from_deleted_campaign(message.message_id, campaign_id)
                    .await;
            } else if let Some(code) = failure(&outcome) {
                tracing::warn!(%code, "accepted message was not captured into its campaign");
            }
        }

        record(SmtpReply::accepted(), "accepted")
    }

    async fn record_chaos_receive(&self, chaos_address_id: AggregateId) {
        let outcome = self.chaos.record_receive(chaos_address_id).await;
        if let Some(code) = failure(&outcome) {
            tracing::warn!(%chaos_address_id, %code, "chaos receive not recorded");
        }
    }
}

impl<S: EventStore + Clone> InboundMailHandler<S> {
    /// Deletes a just-stored message whose campaign is already gone. The
    /// cascade for that campaign may have run before the message existed.
    async fn withdraw_from_deleted_campaign(&self, message_id: MessageId, campaign_id: AggregateId) {
        let force = match self.campaign_streams.load(campaign_id).await {
            Ok(Some(campaign)) if campaign.is_deleted() => campaign.deleted_with_force(),
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(%campaign_id, error = %e, "could not load deleted campaign");
                return;
            }
        };

        let reason = DeletionReason::CampaignDeleted { campaign_id, force };
        // The reply is already decided; this write must not be cancelled.
        let outcome = self
            .emails
            .delete_with_reason(message_id, reason, &CancellationToken::new())
            .await;
        if outcome.is_succeeded() {
            metrics::counter!("late_campaign_emails_deleted_total").increment(1);
            tracing::info!(%campaign_id, "message for deleted campaign removed");
        } else if outcome.error_code() != Some(ErrorCode::EmailAlreadyDeleted)
            && let Some(code) = failure(&outcome)
        {
            tracing::warn!(%campaign_id, %code, "message for deleted campaign left live");
        }
    }
}

fn record(reply: SmtpReply, outcome: &'static str) -> SmtpReply {
    metrics::counter!("inbound_messages_total", "outcome" => outcome).increment(1);
    reply
}

/// Describes a failed outcome for logging.
fn failure<T>(outcome: &CommandOutcome<T>) -> Option<String> {
    match outcome {
        CommandOutcome::Succeeded(_) => None,
        CommandOutcome::Failed { code, message } => Some(format!("{code}: {message}")),
        CommandOutcome::ValidationFailed(errors) => Some(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}
