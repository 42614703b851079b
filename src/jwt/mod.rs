//! Claim handling: payload, allow-list policy and signing.

pub mod claims;
pub mod policy;
pub mod serializer;

pub use claims::{is_reserved, Claims, AUDIENCE_CLAIM, RESERVED_CLAIMS};
pub use policy::ClaimPolicy;
pub use serializer::serialize;
