//! Private JSON Web Keys and their conversion into signing material.

use crate::error::ConfigError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::EncodingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Private JSON Web Key (RFC 7517/7518) as it appears in the signing key set.
///
/// Private parameters are wiped when the parsed document is dropped.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Jwk {
    /// Key type (oct, RSA, EC, OKP)
    pub kty: String,
    /// Key ID
    pub kid: Option<String>,
    /// Declared signing algorithm
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// Curve for EC and OKP keys
    pub crv: Option<String>,
    /// Symmetric secret
    pub k: Option<String>,
    /// RSA modulus
    pub n: Option<String>,
    /// RSA public exponent
    pub e: Option<String>,
    /// Private exponent (RSA) or private scalar/seed (EC, OKP)
    pub d: Option<String>,
    /// RSA first prime factor
    pub p: Option<String>,
    /// RSA second prime factor
    pub q: Option<String>,
    /// EC x coordinate or OKP public key
    pub x: Option<String>,
    /// EC y coordinate
    pub y: Option<String>,
}

/// JSON Web Key Set document.
#[derive(Deserialize)]
pub struct JwkSet {
    /// Keys in document order
    pub keys: Vec<Jwk>,
}

/// Key material in the form `jsonwebtoken` expects for each key family.
pub enum KeyMaterial {
    /// HMAC secret
    Secret(Zeroizing<Vec<u8>>),
    /// RSA private key, PKCS#1 DER
    Rsa(Zeroizing<Vec<u8>>),
    /// P-256 private key, PKCS#8 DER
    Ec(Zeroizing<Vec<u8>>),
    /// Ed25519 private key, PKCS#8 DER
    Ed(Zeroizing<Vec<u8>>),
}

impl KeyMaterial {
    /// Build the encoding key handed to the signer.
    #[must_use]
    pub fn encoding_key(&self) -> EncodingKey {
        match self {
            Self::Secret(secret) => EncodingKey::from_secret(secret),
            Self::Rsa(der) => EncodingKey::from_rsa_der(der),
            Self::Ec(der) => EncodingKey::from_ec_der(der),
            Self::Ed(der) => EncodingKey::from_ed_der(der),
        }
    }

    /// JWK key type this material came from.
    #[must_use]
    pub const fn kty(&self) -> &'static str {
        match self {
            Self::Secret(_) => "oct",
            Self::Rsa(_) => "RSA",
            Self::Ec(_) => "EC",
            Self::Ed(_) => "OKP",
        }
    }
}

/// A signing key from the registry.
pub struct SigningKey {
    kid: String,
    algorithm: String,
    material: KeyMaterial,
}

impl SigningKey {
    /// Create a signing key from already converted material.
    #[must_use]
    pub fn new(kid: impl Into<String>, algorithm: impl Into<String>, material: KeyMaterial) -> Self {
        Self {
            kid: kid.into(),
            algorithm: algorithm.into(),
            material,
        }
    }

    /// Convert a private JWK.
    ///
    /// `position` names the key in errors when it has no `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the key lacks an identifier,
    /// an algorithm or private material, or if the material is invalid.
    pub fn from_jwk(jwk: &Jwk, position: usize) -> Result<Self, ConfigError> {
        let kid = jwk
            .kid
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| ConfigError::invalid_key(format!("#{position}"), "missing kid"))?;
        let algorithm = jwk
            .alg
            .clone()
            .filter(|alg| !alg.is_empty())
            .ok_or_else(|| ConfigError::invalid_key(&kid, "missing alg"))?;

        let material = match jwk.kty.as_str() {
            "oct" => secret_material(jwk, &kid)?,
            "RSA" => rsa_material(jwk, &kid)?,
            "EC" => ec_material(jwk, &kid)?,
            "OKP" => okp_material(jwk, &kid)?,
            other => {
                return Err(ConfigError::invalid_key(
                    &kid,
                    format!("unsupported key type {other}"),
                ))
            }
        };

        Ok(Self {
            kid,
            algorithm,
            material,
        })
    }

    /// Key identifier, embedded as `kid` in token headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Declared algorithm name, verbatim from the key set.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw key material.
    #[must_use]
    pub const fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Build the encoding key handed to the signer.
    #[must_use]
    pub fn encoding_key(&self) -> EncodingKey {
        self.material.encoding_key()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("kty", &self.material.kty())
            .finish_non_exhaustive()
    }
}

fn required<'a>(value: &'a Option<String>, param: &str, kid: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .ok_or_else(|| ConfigError::invalid_key(kid, format!("missing parameter {param}")))
}

fn decode_param(value: &Option<String>, param: &str, kid: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    let encoded = required(value, param, kid)?;
    URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map(Zeroizing::new)
        .map_err(|e| ConfigError::invalid_key(kid, format!("parameter {param}: {e}")))
}

fn secret_material(jwk: &Jwk, kid: &str) -> Result<KeyMaterial, ConfigError> {
    let secret = decode_param(&jwk.k, "k", kid)?;
    if secret.is_empty() {
        return Err(ConfigError::invalid_key(kid, "empty secret"));
    }
    Ok(KeyMaterial::Secret(secret))
}

fn rsa_material(jwk: &Jwk, kid: &str) -> Result<KeyMaterial, ConfigError> {
    let uint = |value: &Option<String>, param: &str| -> Result<BigUint, ConfigError> {
        decode_param(value, param, kid).map(|bytes| BigUint::from_bytes_be(&bytes))
    };

    let key = RsaPrivateKey::from_components(
        uint(&jwk.n, "n")?,
        uint(&jwk.e, "e")?,
        uint(&jwk.d, "d")?,
        vec![uint(&jwk.p, "p")?, uint(&jwk.q, "q")?],
    )
    .map_err(|e| ConfigError::invalid_key(kid, format!("invalid RSA key: {e}")))?;
    key.validate()
        .map_err(|e| ConfigError::invalid_key(kid, format!("invalid RSA key: {e}")))?;

    let der = key
        .to_pkcs1_der()
        .map_err(|e| ConfigError::invalid_key(kid, format!("RSA encoding failed: {e}")))?;
    Ok(KeyMaterial::Rsa(Zeroizing::new(der.as_bytes().to_vec())))
}

fn ec_material(jwk: &Jwk, kid: &str) -> Result<KeyMaterial, ConfigError> {
    use p256::pkcs8::EncodePrivateKey;

    let crv = required(&jwk.crv, "crv", kid)?;
    if crv != "P-256" {
        return Err(ConfigError::invalid_key(kid, format!("unsupported curve {crv}")));
    }

    let d = decode_param(&jwk.d, "d", kid)?;
    let secret = p256::SecretKey::from_slice(&d)
        .map_err(|e| ConfigError::invalid_key(kid, format!("invalid EC scalar: {e}")))?;

    // x/y are optional for signing but must describe the same key when present
    let point = secret.public_key().to_encoded_point(false);
    if let (Some(_), Some(_)) = (&jwk.x, &jwk.y) {
        let x = decode_param(&jwk.x, "x", kid)?;
        let y = decode_param(&jwk.y, "y", kid)?;
        if point.x().map(|c| &c[..]) != Some(x.as_slice())
            || point.y().map(|c| &c[..]) != Some(y.as_slice())
        {
            return Err(ConfigError::invalid_key(kid, "public coordinates do not match d"));
        }
    }

    let der = secret
        .to_pkcs8_der()
        .map_err(|e| ConfigError::invalid_key(kid, format!("EC encoding failed: {e}")))?;
    Ok(KeyMaterial::Ec(Zeroizing::new(der.as_bytes().to_vec())))
}

fn okp_material(jwk: &Jwk, kid: &str) -> Result<KeyMaterial, ConfigError> {
    use ed25519_dalek::pkcs8::EncodePrivateKey;

    let crv = required(&jwk.crv, "crv", kid)?;
    if crv != "Ed25519" {
        return Err(ConfigError::invalid_key(kid, format!("unsupported curve {crv}")));
    }

    let d = decode_param(&jwk.d, "d", kid)?;
    let seed: [u8; 32] = d
        .as_slice()
        .try_into()
        .map_err(|_| ConfigError::invalid_key(kid, "Ed25519 seed must be 32 bytes"))?;
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);

    if jwk.x.is_some() {
        let x = decode_param(&jwk.x, "x", kid)?;
        if signing_key.verifying_key().as_bytes().as_slice() != x.as_slice() {
            return Err(ConfigError::invalid_key(kid, "public key does not match d"));
        }
    }

    let der = signing_key
        .to_pkcs8_der()
        .map_err(|e| ConfigError::invalid_key(kid, format!("Ed25519 encoding failed: {e}")))?;
    Ok(KeyMaterial::Ed(Zeroizing::new(der.as_bytes().to_vec())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Jwk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_oct_key() {
        let jwk = parse(r#"{"kty":"oct","kid":"hmac-1","alg":"HS256","k":"c2VjcmV0LWtleS1mb3ItdGVzdHM"}"#);
        let key = SigningKey::from_jwk(&jwk, 0).unwrap();

        assert_eq!(key.kid(), "hmac-1");
        assert_eq!(key.algorithm(), "HS256");
        assert_eq!(key.material().kty(), "oct");
    }

    #[test]
    fn test_ed25519_key() {
        let seed = [7u8; 32];
        let public = ed25519_dalek::SigningKey::from_bytes(&seed).verifying_key();
        let jwk = parse(&format!(
            r#"{{"kty":"OKP","crv":"Ed25519","kid":"ed-1","alg":"EdDSA","d":"{}","x":"{}"}}"#,
            URL_SAFE_NO_PAD.encode(seed),
            URL_SAFE_NO_PAD.encode(public.as_bytes()),
        ));

        let key = SigningKey::from_jwk(&jwk, 0).unwrap();
        assert_eq!(key.material().kty(), "OKP");
    }

    #[test]
    fn test_ed25519_mismatched_public_key() {
        let jwk = parse(&format!(
            r#"{{"kty":"OKP","crv":"Ed25519","kid":"ed-1","alg":"EdDSA","d":"{}","x":"{}"}}"#,
            URL_SAFE_NO_PAD.encode([7u8; 32]),
            URL_SAFE_NO_PAD.encode([9u8; 32]),
        ));

        assert!(matches!(
            SigningKey::from_jwk(&jwk, 0),
            Err(ConfigError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_missing_kid_reports_position() {
        let jwk = parse(r#"{"kty":"oct","alg":"HS256","k":"c2VjcmV0"}"#);
        let err = SigningKey::from_jwk(&jwk, 3).unwrap_err();

        assert_eq!(err.to_string(), "Invalid key #3: missing kid");
    }

    #[test]
    fn test_missing_alg() {
        let jwk = parse(r#"{"kty":"oct","kid":"k","k":"c2VjcmV0"}"#);
        assert!(SigningKey::from_jwk(&jwk, 0).is_err());
    }

    #[test]
    fn test_public_only_key_rejected() {
        let jwk = parse(r#"{"kty":"EC","crv":"P-256","kid":"pub","alg":"ES256","x":"AA","y":"AA"}"#);
        let err = SigningKey::from_jwk(&jwk, 0).unwrap_err();

        assert!(err.to_string().contains("missing parameter d"));
    }

    #[test]
    fn test_unsupported_curve() {
        let jwk = parse(r#"{"kty":"EC","crv":"P-521","kid":"ec","alg":"ES512","d":"AA"}"#);
        assert!(SigningKey::from_jwk(&jwk, 0).is_err());
    }

    #[test]
    fn test_unsupported_key_type() {
        let jwk = parse(r#"{"kty":"XYZ","kid":"x","alg":"HS256"}"#);
        assert!(SigningKey::from_jwk(&jwk, 0).is_err());
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = SigningKey::new(
            "k1",
            "HS256",
            KeyMaterial::Secret(Zeroizing::new(b"super-secret".to_vec())),
        );
        let rendered = format!("{key:?}");

        assert!(rendered.contains("k1"));
        assert!(!rendered.contains("super-secret"));
    }
}
