use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a `Copy` newtype over [`Uuid`] with the conversions every
/// identifier in the system shares.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the all-zero identifier, used as the "missing" value
            /// by callers that cannot express absence any other way.
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Returns true for the all-zero identifier.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identity of one event stream (one aggregate instance).
    AggregateId
);

uuid_id!(
    /// Identity of a registered mail domain.
    DomainId
);

uuid_id!(
    /// Identity of a subdomain under a registered domain.
    SubdomainId
);

uuid_id!(
    /// Identity of a captured message. Doubles as the id of the email's stream.
    MessageId
);

impl From<MessageId> for AggregateId {
    fn from(id: MessageId) -> Self {
        Self(id.0)
    }
}

impl From<SubdomainId> for AggregateId {
    fn from(id: SubdomainId) -> Self {
        Self(id.0)
    }
}
