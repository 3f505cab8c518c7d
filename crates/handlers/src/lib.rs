//! Command side of the mail service.
//!
//! Every handler follows the same shape: validate the input, load the
//! aggregate, run the command method, save the raised events and only then
//! publish integration events. Callers get a [`CommandOutcome`] back, never
//! an `Err`.
//!
//! Campaign captures additionally run under a per-campaign lock from
//! [`KeyedLocks`], and inbound deliveries are routed by
//! [`InboundMailHandler`].

pub mod campaign;
pub mod chaos;
pub mod context;
pub mod email;
pub mod error;
pub mod inbound;
pub mod integration;
pub mod locks;
pub mod outcome;
pub mod subdomain;
pub mod validation;

#[cfg(test)]
mod testing;

pub use campaign::{
    CampaignHandler, CaptureRecorded, DEFAULT_CAPTURE_ATTEMPTS, DeleteCampaign, RecordCapture,
};
pub use chaos::{ChaosAddressHandler, CreateChaosAddress, EditChaosAddress};
pub use context::HandlerContext;
pub use email::{EmailHandler, ReceiveEmail};
pub use error::{HandlerError, Result};
pub use inbound::{InboundMailHandler, InboundMessage, ResolvedRecipient, SmtpReply, campaign_value};
pub use integration::{
    InMemoryPublisher, IntegrationEvent, IntegrationEventPublisher, PublishError, TracingPublisher,
};
pub use locks::{KeyGuard, KeyedLocks};
pub use outcome::{CommandOutcome, ErrorCode, FieldError};
pub use subdomain::{RegisterSubdomain, SubdomainHandler};
pub use validation::Validator;
