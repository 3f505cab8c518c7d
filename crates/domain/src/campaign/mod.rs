//! Campaigns: messages grouped by a tracking token under a derived identity.

mod aggregate;
mod events;
mod identity;

pub use aggregate::Campaign;
pub use events::{CampaignCreatedData, CampaignDeletedData, CampaignEvent, CaptureRecordedData};
pub use identity::derive_campaign_id;

use thiserror::Error;

/// Longest accepted campaign token, in characters.
pub const MAX_CAMPAIGN_VALUE_LEN: usize = 255;

/// Errors that can occur during campaign operations.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Invalid campaign data: {0}")]
    InvalidCampaignData(String),

    #[error("Campaign has been deleted")]
    CampaignAlreadyDeleted,
}
