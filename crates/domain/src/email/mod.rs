//! Received emails and their lifecycle.

mod aggregate;
mod events;

pub use aggregate::{Email, ReceivedEmail};
pub use events::{
    DeletionReason, EmailDeletedData, EmailEvent, EmailReceivedData, FavoriteToggledData,
};

use thiserror::Error;

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email is already a favorite")]
    AlreadyFavorited,

    #[error("Email is not a favorite")]
    NotFavorited,

    #[error("Email has already been deleted")]
    AlreadyDeleted,
}
