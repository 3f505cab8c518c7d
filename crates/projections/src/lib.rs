//! Read models and projections for the query side.
//!
//! This crate provides:
//! - [`Projection`] trait for processing events into read models
//! - [`DocumentProjection`], one record per stream built from create and patch rules
//! - [`ProjectionProcessor`] for feeding the global log to projections
//! - Views over chaos addresses, campaigns, emails and subdomains
//! - [`CampaignDeletionCascade`], which deletes a deleted campaign's emails

pub mod cascade;
pub mod document;
pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use cascade::CampaignDeletionCascade;
pub use document::{DocumentProjection, DocumentRules, Rule, append_unique};
pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    CampaignSummary, CampaignsView, ChaosAddressSummary, ChaosAddressesView, EmailSummary,
    EmailsView, SubdomainSummary, SubdomainsView,
};
