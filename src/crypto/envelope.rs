//! Encrypted envelope — RSA-OAEP key wrap + AES-256-GCM payload encryption
//!
//! A fresh 256-bit AES key and a fresh 128-bit IV are drawn from the OS
//! CSPRNG for every seal, so a (key, nonce) pair is used for exactly one
//! encryption. The AES key is wrapped under the recipient's RSA public key
//! with OAEP (MGF1-SHA-256, no label); the payload is encrypted with
//! AES-256-GCM and the 128-bit tag is carried separately. All four fields
//! travel base64-encoded.

use aes::Aes256;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// AES-256-GCM with the 16-byte IV the wire format uses.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

const AES_KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// The sealed response payload. Carries no identity linking it to a key;
/// the caller must already hold the private half of the wrapping key it
/// supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// AES key wrapped under the recipient's RSA public key (base64).
    pub encrypted_key: String,
    /// GCM nonce (base64).
    pub iv: String,
    /// Encrypted payload (base64).
    pub ciphertext: String,
    /// GCM authentication tag (base64).
    pub auth_tag: String,
}

/// Seal a plaintext to the recipient's public key.
pub fn seal(plaintext: &[u8], recipient: &RsaPublicKey) -> Result<EncryptedEnvelope, CryptoError> {
    let mut aes_key = [0u8; AES_KEY_LEN];
    OsRng.fill_bytes(&mut aes_key);

    let encrypted_key = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &aes_key)
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm16::new_from_slice(&aes_key).map_err(|_| CryptoError::BadKeyLength)?;
    // The aead API appends the tag to the ciphertext; the wire format wants
    // them separate.
    let mut sealed = cipher
        .encrypt(Nonce::<U16>::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Encrypt)?;
    let auth_tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(EncryptedEnvelope {
        encrypted_key: BASE64.encode(encrypted_key),
        iv: BASE64.encode(iv),
        ciphertext: BASE64.encode(&sealed),
        auth_tag: BASE64.encode(&auth_tag),
    })
}

/// Open a sealed envelope with the matching private key. Fails without
/// returning any plaintext when the tag does not verify.
pub fn open(envelope: &EncryptedEnvelope, recipient: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let encrypted_key = BASE64.decode(&envelope.encrypted_key)?;
    let iv = BASE64.decode(&envelope.iv)?;
    let ciphertext = BASE64.decode(&envelope.ciphertext)?;
    let auth_tag = BASE64.decode(&envelope.auth_tag)?;

    if iv.len() != IV_LEN || auth_tag.len() != TAG_LEN {
        return Err(CryptoError::MalformedEnvelope);
    }

    let aes_key = recipient
        .decrypt(Oaep::new::<Sha256>(), &encrypted_key)
        .map_err(|e| CryptoError::KeyUnwrap(e.to_string()))?;
    if aes_key.len() != AES_KEY_LEN {
        return Err(CryptoError::MalformedEnvelope);
    }

    let cipher = Aes256Gcm16::new_from_slice(&aes_key).map_err(|_| CryptoError::BadKeyLength)?;
    let mut sealed = ciphertext;
    sealed.extend_from_slice(&auth_tag);
    cipher
        .decrypt(Nonce::<U16>::from_slice(&iv), sealed.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Errors from sealing or opening an envelope.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid base64 in envelope: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("envelope field has wrong length")]
    MalformedEnvelope,

    #[error("AES key has wrong length")]
    BadKeyLength,

    #[error("RSA key wrap failed: {0}")]
    KeyWrap(String),

    #[error("RSA key unwrap failed: {0}")]
    KeyUnwrap(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("authentication tag verification failed")]
    AuthenticationFailed,
}
