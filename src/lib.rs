//! sealserve — attestation-gated confidential content server
//!
//! Serves named files and directories to remote clients, but only after the
//! client's execution environment proves, via hardware-rooted remote
//! attestation, that it matches a policy-defined measurement — and never in
//! the clear: every payload is sealed to a client-supplied public key.

pub mod attestation;
pub mod config;
pub mod content;
pub mod crypto;
pub mod fetch;
pub mod server;

pub use attestation::{AttestationGate, ProcessVerifier, StaticVerifier, Verifier};
pub use config::{Config, ConfigError};
pub use crypto::{open, seal, EncryptedEnvelope};
pub use fetch::{FetchError, FetchOptions, FetchOrchestrator, FetchPayload, FetchRequest};
