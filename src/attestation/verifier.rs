//! Verifier capability and its result-code taxonomy
//!
//! Result codes follow the external verifier's contract: 0 is success and
//! every nonzero code names one mismatch cause. The production binding
//! shells out to the verifier executable and reads its exit status; tests
//! inject [`StaticVerifier`] with canned codes.

use std::process::Command;

/// Result code for a successful verification.
pub const CODE_SUCCESS: i32 = 0;

/// Outcome of verifying one piece of evidence against one expected digest.
/// Produced per request and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Success,
    /// Generic failure or an unmapped nonzero code.
    Failed,
    /// Verifier rejected its inputs.
    InvalidInput,
    /// Verifier could not allocate working memory.
    AllocationFailed,
    /// Certificate chain signature validation failed.
    CertChainInvalid,
    /// Hardware vendor root key does not match the certificate chain.
    RootKeyMismatch,
    /// Report signature verification failed.
    SignatureInvalid,
    /// Report data does not match the expected nonce.
    ReportDataMismatch,
    /// Expected policy digest could not be decoded.
    PolicyDecode,
    /// Expected policy digest could not be hashed.
    PolicyHash,
    /// Report host data does not match the expected policy digest.
    PolicyDigestMismatch,
    /// Endorsement issuer mismatch.
    EndorsementIssuer,
    /// Endorsement feed mismatch.
    EndorsementFeed,
    /// Endorsement SVN below minimum.
    EndorsementSvnTooLow,
    /// Endorsement certificate chain invalid.
    EndorsementCertChain,
    /// Endorsement signature verification failed.
    EndorsementSignature,
    /// Launch measurement could not be extracted from the endorsement.
    EndorsementMeasurementExtract,
    /// Endorsement does not match the report launch measurement.
    EndorsementMeasurementMismatch,
    /// The bounded verifier call did not return in time.
    TimedOut,
}

impl VerificationOutcome {
    /// Map a verifier result code to its tagged outcome.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => VerificationOutcome::Success,
            2 => VerificationOutcome::InvalidInput,
            3 => VerificationOutcome::AllocationFailed,
            10 => VerificationOutcome::CertChainInvalid,
            11 => VerificationOutcome::RootKeyMismatch,
            12 => VerificationOutcome::SignatureInvalid,
            20 => VerificationOutcome::ReportDataMismatch,
            30 => VerificationOutcome::PolicyDecode,
            31 => VerificationOutcome::PolicyHash,
            32 => VerificationOutcome::PolicyDigestMismatch,
            40 => VerificationOutcome::EndorsementIssuer,
            41 => VerificationOutcome::EndorsementFeed,
            42 => VerificationOutcome::EndorsementSvnTooLow,
            43 => VerificationOutcome::EndorsementCertChain,
            44 => VerificationOutcome::EndorsementSignature,
            45 => VerificationOutcome::EndorsementMeasurementExtract,
            46 => VerificationOutcome::EndorsementMeasurementMismatch,
            _ => VerificationOutcome::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Success)
    }

    /// Human-readable cause, for internal logs only. Never returned to the
    /// caller.
    pub fn message(&self) -> &'static str {
        match self {
            VerificationOutcome::Success => "success",
            VerificationOutcome::Failed => "generic verification failure",
            VerificationOutcome::InvalidInput => "invalid verifier input",
            VerificationOutcome::AllocationFailed => "verifier allocation failure",
            VerificationOutcome::CertChainInvalid => "certificate chain invalid",
            VerificationOutcome::RootKeyMismatch => "vendor root key mismatch",
            VerificationOutcome::SignatureInvalid => "report signature invalid",
            VerificationOutcome::ReportDataMismatch => "report data mismatch",
            VerificationOutcome::PolicyDecode => "policy digest decode failure",
            VerificationOutcome::PolicyHash => "policy digest hash failure",
            VerificationOutcome::PolicyDigestMismatch => "policy digest mismatch",
            VerificationOutcome::EndorsementIssuer => "endorsement issuer mismatch",
            VerificationOutcome::EndorsementFeed => "endorsement feed mismatch",
            VerificationOutcome::EndorsementSvnTooLow => "endorsement SVN too low",
            VerificationOutcome::EndorsementCertChain => "endorsement certificate chain invalid",
            VerificationOutcome::EndorsementSignature => "endorsement signature invalid",
            VerificationOutcome::EndorsementMeasurementExtract => {
                "endorsement launch measurement extraction failed"
            }
            VerificationOutcome::EndorsementMeasurementMismatch => {
                "endorsement launch measurement mismatch"
            }
            VerificationOutcome::TimedOut => "verifier call timed out",
        }
    }
}

/// The external attestation verifier, injected as a capability so the
/// production binary can bind the native verifier while tests use canned
/// codes. The call is synchronous and may be slow; callers bound it.
pub trait Verifier: Send + Sync {
    /// Verify evidence against the expected report data and one expected
    /// policy digest. Returns the verifier's numeric result code.
    fn verify(&self, evidence: &str, expected_report_data: &str, policy_digest_b64: &str) -> i32;
}

/// Production binding: spawn the external verifier executable and map its
/// exit status to a result code. Evidence travels on the command line the
/// same way the verifier's own CLI consumes it.
#[derive(Debug, Clone)]
pub struct ProcessVerifier {
    program: String,
}

impl ProcessVerifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Verifier for ProcessVerifier {
    fn verify(&self, evidence: &str, expected_report_data: &str, policy_digest_b64: &str) -> i32 {
        let output = Command::new(&self.program)
            .arg(evidence)
            .arg("--report-data")
            .arg(expected_report_data)
            .arg("--security-policy-b64")
            .arg(policy_digest_b64)
            .output();

        match output {
            Ok(output) => output.status.code().unwrap_or(1),
            Err(e) => {
                log::error!("failed to spawn verifier '{}': {e}", self.program);
                1
            }
        }
    }
}

/// A verifier that always answers with a fixed code. Test double, also
/// behind the `--no-attestation` development mode.
#[derive(Debug, Clone)]
pub struct StaticVerifier {
    code: i32,
}

impl StaticVerifier {
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// A verifier that accepts everything.
    pub fn accepting() -> Self {
        Self::new(CODE_SUCCESS)
    }
}

impl Verifier for StaticVerifier {
    fn verify(&self, _evidence: &str, _report_data: &str, _policy_digest_b64: &str) -> i32 {
        self.code
    }
}
