//! Read model views.

pub mod campaigns;
pub mod chaos_addresses;
pub mod emails;
pub mod subdomains;

pub use campaigns::{CampaignSummary, CampaignsView};
pub use chaos_addresses::{ChaosAddressSummary, ChaosAddressesView};
pub use emails::{EmailSummary, EmailsView};
pub use subdomains::{SubdomainSummary, SubdomainsView};
