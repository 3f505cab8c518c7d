//! Deterministic campaign identity.

use common::{AggregateId, SubdomainId};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derives the campaign stream id for a token seen on a subdomain.
///
/// The id is the first 16 bytes of `SHA256("<subdomain uuid>:<value>")`,
/// with the subdomain rendered as a lowercase hyphenated UUID. Every caller
/// that sees the same pair computes the same id without a lookup.
pub fn derive_campaign_id(subdomain_id: SubdomainId, value: &str) -> AggregateId {
    let mut hasher = Sha256::new();
    hasher.update(subdomain_id.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    AggregateId::from_uuid(Uuid::from_bytes(bytes))
}
