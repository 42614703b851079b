//! Closed allow-list of caller-supplied claims.

use crate::error::{ConfigError, ValidationError};
use crate::jwt::claims::{is_reserved, AUDIENCE_CLAIM};
use std::collections::{BTreeMap, HashMap};

/// The exact set of claim names a caller must supply.
///
/// `aud` is always part of the set. The policy is immutable after
/// construction, so enforcement never depends on earlier requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPolicy {
    accepted: Vec<String>,
}

impl ClaimPolicy {
    /// Build the policy from a comma-separated list of claim names.
    ///
    /// Names are trimmed, empty entries dropped and duplicates collapsed;
    /// `aud` is appended once.
    #[must_use]
    pub fn initialize(claim_names_csv: Option<&str>) -> Self {
        let mut accepted: Vec<String> = Vec::new();
        let names = claim_names_csv
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .chain(std::iter::once(AUDIENCE_CLAIM));

        for name in names {
            if !name.is_empty() && !accepted.iter().any(|n| n == name) {
                accepted.push(name.to_string());
            }
        }

        Self { accepted }
    }

    /// Accepted claim names in configuration order.
    #[must_use]
    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    /// Fail if an accepted name collides with a system-generated claim.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReservedClaim`] naming the first collision.
    pub fn ensure_disjoint_from_reserved(&self) -> Result<(), ConfigError> {
        match self.accepted.iter().find(|name| is_reserved(name)) {
            Some(name) => Err(ConfigError::ReservedClaim(name.clone())),
            None => Ok(()),
        }
    }

    /// Check that `raw` holds exactly the accepted claims.
    ///
    /// Each accepted claim is moved out of `raw` into the result; whatever
    /// is left afterwards was not allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingClaim`] for the first accepted
    /// name that is absent, or [`ValidationError::UnexpectedClaims`] with
    /// the sorted leftover names.
    pub fn enforce(
        &self,
        mut raw: HashMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ValidationError> {
        let mut validated = BTreeMap::new();

        for name in &self.accepted {
            let (name, value) = raw
                .remove_entry(name)
                .ok_or_else(|| ValidationError::MissingClaim(name.clone()))?;
            validated.insert(name, value);
        }

        if !raw.is_empty() {
            let mut remaining: Vec<String> = raw.into_keys().collect();
            remaining.sort();
            return Err(ValidationError::UnexpectedClaims(remaining));
        }

        Ok(validated)
    }
}
