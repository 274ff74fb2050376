//! Wrapping-key codecs
//!
//! Clients supply their RSA public key as base64-wrapped PEM in the fetch
//! request body. These helpers convert between that wire form, PEM, and the
//! in-memory key types; `generate_key_pair` backs tests and the `keygen`
//! tooling subcommand.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Errors from key parsing or generation.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid base64 key encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("key is not valid UTF-8 PEM")]
    NotUtf8,

    #[error("failed to parse key: {0}")]
    Parse(String),

    #[error("failed to generate key pair: {0}")]
    Generate(String),
}

/// Parse a base64-wrapped PEM public key, the form carried in the
/// `wrapping_key` request field.
pub fn public_key_from_b64(b64: &str) -> Result<RsaPublicKey, KeyError> {
    let pem_bytes = BASE64.decode(b64.trim())?;
    let pem = String::from_utf8(pem_bytes).map_err(|_| KeyError::NotUtf8)?;
    RsaPublicKey::from_public_key_pem(&pem).map_err(|e| KeyError::Parse(e.to_string()))
}

/// Encode a public key as base64-wrapped PEM for a request body.
pub fn public_key_to_b64(key: &RsaPublicKey) -> Result<String, KeyError> {
    let pem = key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::Parse(e.to_string()))?;
    Ok(BASE64.encode(pem.as_bytes()))
}

/// Encode a public key as SPKI PEM.
pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String, KeyError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::Parse(e.to_string()))
}

/// Parse a PKCS#8 PEM private key.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| KeyError::Parse(e.to_string()))
}

/// Encode a private key as PKCS#8 PEM.
pub fn private_key_to_pem(key: &RsaPrivateKey) -> Result<String, KeyError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| KeyError::Parse(e.to_string()))
}

/// Generate an RSA key pair with the given modulus size.
pub fn generate_key_pair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey), KeyError> {
    let private_key =
        RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| KeyError::Generate(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}
