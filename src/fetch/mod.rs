//! Fetch orchestrator — the request-handling state machine
//!
//! One linear, fail-fast pass per request:
//! parse body → parse attestation → verify attestation → resolve target →
//! package content → seal response. Nothing is retried: attestation and
//! cryptographic failures are not transient. The only shared state is the
//! immutable [`Config`], so any number of requests can run concurrently.
//!
//! Historical handler variants (attested+sealed, open) are expressed as
//! [`FetchOptions`] flags selecting active gates over this one machine
//! rather than duplicated code paths.

use crate::attestation::AttestationGate;
use crate::config::Config;
use crate::content::{self, AccessError};
use crate::crypto::{self, EncryptedEnvelope};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

/// Which gates are active. Defaults to the full protocol; the flags exist
/// for development modes and for serving non-confidential content with the
/// same machine.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub require_attestation: bool,
    pub seal_response: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            require_attestation: true,
            seal_response: true,
        }
    }
}

/// A transport-agnostic fetch request: the target name from the request
/// path, the raw body, and whether the transport declared it as JSON.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub target: &'a str,
    pub body: &'a [u8],
    pub json: bool,
}

/// The response payload: sealed under the caller's wrapping key, or plain
/// bytes when sealing is disabled.
#[derive(Debug)]
pub enum FetchPayload {
    Sealed(EncryptedEnvelope),
    Plain(Vec<u8>),
}

/// Request rejection, already collapsed to what the caller is allowed to
/// learn. Verification causes and the missing-vs-unconfigured distinction
/// stay in the logs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request body must be JSON")]
    UnsupportedMedia,

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("attestation verification failed")]
    Forbidden,

    #[error("target not found")]
    NotFound,

    #[error("internal server error")]
    Internal,
}

impl FetchError {
    /// The HTTP-style status the transport should answer with.
    pub fn status(&self) -> u16 {
        match self {
            FetchError::UnsupportedMedia => 415,
            FetchError::BadRequest(_) => 400,
            FetchError::Forbidden => 403,
            FetchError::NotFound => 404,
            FetchError::Internal => 500,
        }
    }
}

pub struct FetchOrchestrator {
    config: Arc<Config>,
    root: PathBuf,
    gate: AttestationGate,
    options: FetchOptions,
}

impl FetchOrchestrator {
    pub fn new(
        config: Arc<Config>,
        root: PathBuf,
        gate: AttestationGate,
        options: FetchOptions,
    ) -> Self {
        Self {
            config,
            root,
            gate,
            options,
        }
    }

    /// Run one request through the state machine.
    pub fn handle(&self, request: FetchRequest<'_>) -> Result<FetchPayload, FetchError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let short_id = &request_id[..8];
        log::info!("[{short_id}] fetch target={:?}", request.target);

        // PARSE_BODY
        let body = self.parse_body(&request)?;

        // PARSE_ATTESTATION
        let attestation = if self.options.require_attestation {
            Some(Self::parse_attestation(&body)?)
        } else {
            None
        };

        // The wrapping key arrives with the request; parsing it is still
        // request validation, not a crypto failure.
        let wrapping_key = if self.options.seal_response {
            let b64 = body
                .get("wrapping_key")
                .and_then(Value::as_str)
                .ok_or(FetchError::BadRequest("missing wrapping key"))?;
            let key = crypto::public_key_from_b64(b64)
                .map_err(|_| FetchError::BadRequest("invalid wrapping key"))?;
            Some((b64.to_string(), key))
        } else {
            None
        };

        // Policy selection precedes verification: the digest set is bound
        // to the target. An unconfigured target is indistinguishable from a
        // missing one.
        if self.config.binding(request.target).is_none() {
            log::info!("[{short_id}] target not configured");
            return Err(FetchError::NotFound);
        }
        let digests = self.config.digests_for(request.target);

        // VERIFY_ATTESTATION
        if let Some(evidence) = &attestation {
            let key_b64 = wrapping_key.as_ref().map(|(b64, _)| b64.as_str());
            let report_data = expected_report_data(key_b64.unwrap_or(""));
            let outcome = self.gate.verify_any(evidence, &report_data, &digests);
            if !outcome.is_success() {
                log::warn!("[{short_id}] attestation rejected: {}", outcome.message());
                return Err(FetchError::Forbidden);
            }
            log::info!("[{short_id}] attestation verified");
        }

        // RESOLVE_TARGET (re-validated at request time; config load is not
        // trusted to still hold)
        let resolved = content::resolve(&self.root, request.target).map_err(
            |AccessError::NotFound| {
                log::info!("[{short_id}] target not resolvable on disk");
                FetchError::NotFound
            },
        )?;

        // PACKAGE_CONTENT
        let plaintext = content::package(&resolved).map_err(|e| {
            log::error!("[{short_id}] packaging failed: {e}");
            FetchError::Internal
        })?;

        // SEAL_RESPONSE
        match wrapping_key {
            Some((_, public_key)) => {
                let envelope = crypto::seal(&plaintext, &public_key).map_err(|e| {
                    log::error!("[{short_id}] sealing failed: {e}");
                    FetchError::Internal
                })?;
                log::info!("[{short_id}] responded with sealed payload");
                Ok(FetchPayload::Sealed(envelope))
            }
            None => {
                log::info!("[{short_id}] responded with plain payload");
                Ok(FetchPayload::Plain(plaintext))
            }
        }
    }

    fn parse_body(&self, request: &FetchRequest<'_>) -> Result<Value, FetchError> {
        if !request.json {
            return Err(FetchError::UnsupportedMedia);
        }
        let value: Value =
            serde_json::from_slice(request.body).map_err(|_| FetchError::UnsupportedMedia)?;
        if !value.is_object() {
            return Err(FetchError::UnsupportedMedia);
        }
        Ok(value)
    }

    /// Decode the attestation field: base64-wrapped evidence text. Missing
    /// or undecodable evidence is a request error, distinct from any
    /// verification mismatch.
    fn parse_attestation(body: &Value) -> Result<String, FetchError> {
        let b64 = body
            .get("attestation")
            .and_then(Value::as_str)
            .ok_or(FetchError::BadRequest("missing attestation"))?;
        let decoded = BASE64
            .decode(b64)
            .map_err(|_| FetchError::BadRequest("invalid base64 attestation"))?;
        String::from_utf8(decoded).map_err(|_| FetchError::BadRequest("invalid base64 attestation"))
    }
}

/// The report data the evidence must carry: the SHA-256 of the caller's
/// wrapping key. Binding the sealing key into the evidence stops an
/// attacker from replaying someone else's attestation with their own key.
pub fn expected_report_data(wrapping_key_b64: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(wrapping_key_b64.as_bytes());
    hex::encode(hasher.finalize())
}
