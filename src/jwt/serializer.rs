//! Compact JWS serialization.

use crate::error::IssueError;
use crate::jwks::SigningKey;
use crate::jwt::claims::Claims;
use jsonwebtoken::{encode, Algorithm, Header};
use std::str::FromStr;

/// Sign `claims` with `key` and return the compact token.
///
/// The header carries the key's declared algorithm and its `kid`.
///
/// # Errors
///
/// Returns [`IssueError::SigningFailure`] if the algorithm is unknown or
/// does not fit the key.
pub fn serialize(claims: &Claims, key: &SigningKey) -> Result<String, IssueError> {
    let algorithm = Algorithm::from_str(key.algorithm()).map_err(|_| {
        IssueError::SigningFailure(format!("unknown algorithm {}", key.algorithm()))
    })?;

    let mut header = Header::new(algorithm);
    header.kid = Some(key.kid().to_string());

    encode(&header, claims, &key.encoding_key()).map_err(IssueError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::KeyMaterial;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
    use std::collections::BTreeMap;
    use zeroize::Zeroizing;

    const SECRET: &[u8] = b"test-secret-key-for-testing-only";

    fn hmac_key(kid: &str, alg: &str) -> SigningKey {
        SigningKey::new(kid, alg, KeyMaterial::Secret(Zeroizing::new(SECRET.to_vec())))
    }

    fn test_claims() -> Claims {
        let caller = BTreeMap::from([
            ("aud".to_string(), "api".to_string()),
            ("role".to_string(), "reader".to_string()),
        ]);
        Claims::new("test-issuer", 3600).with_caller_claims(caller)
    }

    #[test]
    fn test_round_trip_hs256() {
        let claims = test_claims();
        let token = serialize(&claims, &hmac_key("key-1", "HS256")).unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key-1"));
        assert_eq!(header.alg, Algorithm::HS256);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["api"]);
        let decoded = decode::<Claims>(&token, &DecodingKey::from_secret(SECRET), &validation).unwrap();

        assert_eq!(decoded.claims, claims);
    }

    #[test]
    fn test_round_trip_eddsa() {
        let seed = [42u8; 32];
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        let der = {
            use ed25519_dalek::pkcs8::EncodePrivateKey;
            signing_key.to_pkcs8_der().unwrap()
        };
        let key = SigningKey::new("ed-1", "EdDSA", KeyMaterial::Ed(Zeroizing::new(der.as_bytes().to_vec())));

        let claims = test_claims();
        let token = serialize(&claims, &key).unwrap();

        let x = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().as_bytes());
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_audience(&["api"]);
        let decoded = decode::<Claims>(&token, &DecodingKey::from_ed_components(&x).unwrap(), &validation).unwrap();

        assert_eq!(decoded.claims.id, claims.id);
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = serialize(&test_claims(), &hmac_key("key-1", "XX999")).unwrap_err();
        assert!(matches!(err, IssueError::SigningFailure(_)));
    }

    #[test]
    fn test_algorithm_key_mismatch() {
        // RS256 declared on an HMAC secret
        let err = serialize(&test_claims(), &hmac_key("key-1", "RS256")).unwrap_err();
        assert!(matches!(err, IssueError::SigningFailure(_)));
    }
}
