// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conversion of JWK key material into verification keys.
//!
//! RSA keys are rebuilt from their big-endian modulus and exponent. EC keys
//! are rebuilt from their affine coordinates on P-256, P-384 or P-521.
//!
//! Known gap: coordinates are not checked to lie on the curve here. An
//! off-curve point decodes fine and is only rejected when the signature
//! backend tries to use it, which surfaces as an invalid signature.

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{Algorithm, DecodingKey};

use super::error::AuthError;
use super::jwks::{KeyMaterial, SigningKey};

/// Elliptic curves accepted in EC keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    pub fn from_name(name: &str) -> Option<Curve> {
        match name {
            "P-256" => Some(Curve::P256),
            "P-384" => Some(Curve::P384),
            "P-521" => Some(Curve::P521),
            _ => None,
        }
    }

    /// Byte length of one affine coordinate.
    fn coordinate_len(self) -> usize {
        match self {
            Curve::P256 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
        }
    }

    /// The signature algorithm that pairs with this curve, if we can verify it.
    fn algorithm(self) -> Option<Algorithm> {
        match self {
            Curve::P256 => Some(Algorithm::ES256),
            Curve::P384 => Some(Algorithm::ES384),
            Curve::P521 => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    /// Big-endian modulus
    pub modulus: Vec<u8>,
    pub exponent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcPublicKey {
    pub curve: Curve,
    /// Big-endian X coordinate, left-padded to the curve's coordinate length
    pub x: Vec<u8>,
    /// Big-endian Y coordinate, left-padded to the curve's coordinate length
    pub y: Vec<u8>,
}

/// A decoded public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ec(EcPublicKey),
}

impl PublicKey {
    /// Whether a token signed with `alg` can be checked against this key.
    pub fn supports(&self, alg: Algorithm) -> bool {
        match self {
            PublicKey::Rsa(_) => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            PublicKey::Ec(ec) => ec.curve.algorithm() == Some(alg),
        }
    }

    /// Build the verification key used by `jsonwebtoken`.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self {
            PublicKey::Rsa(rsa) => {
                let exponent = rsa.exponent.to_be_bytes();
                let first = exponent.iter().position(|b| *b != 0).unwrap_or(exponent.len() - 1);
                Ok(DecodingKey::from_rsa_raw_components(&rsa.modulus, &exponent[first..]))
            }
            PublicKey::Ec(ec) => DecodingKey::from_ec_components(
                &Base64UrlUnpadded::encode_string(&ec.x),
                &Base64UrlUnpadded::encode_string(&ec.y),
            )
            .map_err(|e| AuthError::MalformedKeyEncoding(format!("EC point: {e}"))),
        }
    }
}

/// Decode a signing key's material into a public key.
pub fn decode(key: &SigningKey) -> Result<PublicKey, AuthError> {
    match &key.material {
        KeyMaterial::Rsa { n, e } => {
            let modulus = decode_field(n, "n")?;
            if modulus.iter().all(|b| *b == 0) {
                return Err(AuthError::MalformedKeyEncoding("RSA modulus is zero".into()));
            }
            let exponent = parse_exponent(&decode_field(e, "e")?)?;
            Ok(PublicKey::Rsa(RsaPublicKey { modulus, exponent }))
        }
        KeyMaterial::Ec { crv, x, y } => {
            let curve = Curve::from_name(crv)
                .ok_or_else(|| AuthError::UnsupportedKeyType(format!("EC curve {crv}")))?;
            let x = coordinate(curve, decode_field(x, "x")?, "x")?;
            let y = coordinate(curve, decode_field(y, "y")?, "y")?;
            Ok(PublicKey::Ec(EcPublicKey { curve, x, y }))
        }
        KeyMaterial::Unsupported { kty } => Err(AuthError::UnsupportedKeyType(kty.clone())),
    }
}

fn decode_field(value: &str, name: &str) -> Result<Vec<u8>, AuthError> {
    let bytes = Base64UrlUnpadded::decode_vec(value)
        .map_err(|e| AuthError::MalformedKeyEncoding(format!("`{name}`: {e}")))?;
    if bytes.is_empty() {
        return Err(AuthError::MalformedKeyEncoding(format!("`{name}` is empty")));
    }
    Ok(bytes)
}

/// Big-endian unsigned parse, `e = e * 256 + byte`.
fn parse_exponent(bytes: &[u8]) -> Result<u64, AuthError> {
    let exponent = bytes.iter().try_fold(0u64, |e, b| {
        e.checked_mul(256)
            .and_then(|e| e.checked_add(u64::from(*b)))
    });
    match exponent {
        Some(0) | None => Err(AuthError::MalformedKeyEncoding(
            "RSA exponent out of range".into(),
        )),
        Some(e) => Ok(e),
    }
}

/// Normalise a big-endian coordinate to the curve's fixed width.
fn coordinate(curve: Curve, bytes: Vec<u8>, name: &str) -> Result<Vec<u8>, AuthError> {
    let len = curve.coordinate_len();
    let significant = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let trimmed = &bytes[significant..];
    if trimmed.len() > len {
        return Err(AuthError::MalformedKeyEncoding(format!(
            "`{name}` is longer than {len} bytes"
        )));
    }
    let mut padded = vec![0u8; len - trimmed.len()];
    padded.extend_from_slice(trimmed);
    Ok(padded)
}
