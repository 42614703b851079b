//! Signing keys loaded from a JSON Web Key Set.

pub mod key;
pub mod registry;

pub use key::{Jwk, JwkSet, KeyMaterial, SigningKey};
pub use registry::KeyRegistry;
