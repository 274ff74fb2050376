//! Remote attestation gate — admit only callers with an expected measurement
//!
//! The hardware root-of-trust verifier is an external collaborator consumed
//! through the [`Verifier`] capability: it takes evidence, the expected
//! report data, and an expected policy digest, and answers with a numeric
//! result code. The gate maps codes to a tagged [`VerificationOutcome`],
//! bounds the (potentially slow, blocking) call with a timeout, and accepts
//! success against any of the digests bound to the requested target.
//!
//! Internally outcomes are precise for logging; externally every
//! non-success collapses into one generic rejection so the verifier can
//! never be used as an oracle for guessing correct measurements.

pub mod gate;
pub mod verifier;

pub use gate::AttestationGate;
pub use verifier::{ProcessVerifier, StaticVerifier, VerificationOutcome, Verifier, CODE_SUCCESS};
