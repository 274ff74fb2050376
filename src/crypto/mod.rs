//! Confidentiality layer — hybrid encryption of response payloads
//!
//! Responses are never returned in the clear. Each payload is sealed to a
//! client-supplied RSA public key:
//! - **Envelope**: RSA-OAEP key wrap + AES-256-GCM authenticated encryption
//! - **Keys**: PEM/base64 codecs for wrapping keys, plus pair generation
//!   for tests and tooling

pub mod envelope;
pub mod keys;

pub use envelope::{open, seal, CryptoError, EncryptedEnvelope};
pub use keys::{
    generate_key_pair, private_key_from_pem, private_key_to_pem, public_key_from_b64,
    public_key_to_b64, KeyError,
};
