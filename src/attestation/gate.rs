//! Attestation gate — bounded verification against a target's policy set
//!
//! Wraps the injected [`Verifier`] with the two behaviors the request path
//! needs: the blocking call is bounded by an explicit timeout (a stuck
//! verifier is a rejection, not a hang), and evidence is accepted when it
//! matches *any* of the digests bound to the requested target, not only the
//! first one.

use super::verifier::{VerificationOutcome, Verifier};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct AttestationGate {
    verifier: Arc<dyn Verifier>,
    timeout: Duration,
}

impl AttestationGate {
    pub fn new(verifier: Arc<dyn Verifier>, timeout: Duration) -> Self {
        Self { verifier, timeout }
    }

    /// Verify evidence against every digest in the target's policy set,
    /// accepting on the first success. Failures are not retried; a timeout
    /// aborts the remaining digests.
    pub fn verify_any(
        &self,
        evidence: &str,
        expected_report_data: &str,
        policy_digests: &[&str],
    ) -> VerificationOutcome {
        let mut last = VerificationOutcome::Failed;

        for digest in policy_digests {
            let outcome = self.verify_bounded(evidence, expected_report_data, digest);
            match outcome {
                VerificationOutcome::Success => return outcome,
                VerificationOutcome::TimedOut => {
                    log::warn!("attestation verifier timed out after {:?}", self.timeout);
                    return outcome;
                }
                _ => {
                    log::debug!("digest rejected: {}", outcome.message());
                    last = outcome;
                }
            }
        }

        last
    }

    /// Run one verifier call on its own thread so a slow or wedged verifier
    /// cannot stall the request past the configured timeout.
    fn verify_bounded(
        &self,
        evidence: &str,
        expected_report_data: &str,
        policy_digest: &str,
    ) -> VerificationOutcome {
        let verifier = Arc::clone(&self.verifier);
        let evidence = evidence.to_string();
        let report_data = expected_report_data.to_string();
        let digest = policy_digest.to_string();

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver may be gone after a timeout; dropping the result
            // is the correct behavior then.
            let _ = tx.send(verifier.verify(&evidence, &report_data, &digest));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(code) => VerificationOutcome::from_code(code),
            Err(_) => VerificationOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::verifier::StaticVerifier;

    struct SlowVerifier;

    impl Verifier for SlowVerifier {
        fn verify(&self, _: &str, _: &str, _: &str) -> i32 {
            thread::sleep(Duration::from_secs(5));
            0
        }
    }

    /// Succeeds only for one specific digest.
    struct SingleDigestVerifier {
        accepted: String,
    }

    impl Verifier for SingleDigestVerifier {
        fn verify(&self, _: &str, _: &str, digest: &str) -> i32 {
            if digest == self.accepted {
                0
            } else {
                32
            }
        }
    }

    fn gate(verifier: impl Verifier + 'static) -> AttestationGate {
        AttestationGate::new(Arc::new(verifier), Duration::from_secs(10))
    }

    #[test]
    fn test_success() {
        let outcome = gate(StaticVerifier::accepting()).verify_any("evidence", "nonce", &["YWJj"]);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_rejection_carries_cause() {
        let outcome = gate(StaticVerifier::new(20)).verify_any("evidence", "nonce", &["YWJj"]);
        assert_eq!(outcome, VerificationOutcome::ReportDataMismatch);
    }

    #[test]
    fn test_any_matching_digest_is_accepted() {
        let verifier = SingleDigestVerifier {
            accepted: "ZGVm".to_string(),
        };
        // The matching digest is not first in the set.
        let outcome = gate(verifier).verify_any("evidence", "nonce", &["YWJj", "ZGVm"]);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_no_matching_digest_is_rejected() {
        let verifier = SingleDigestVerifier {
            accepted: "missing".to_string(),
        };
        let outcome = gate(verifier).verify_any("evidence", "nonce", &["YWJj", "ZGVm"]);
        assert_eq!(outcome, VerificationOutcome::PolicyDigestMismatch);
    }

    #[test]
    fn test_empty_digest_set_is_rejected() {
        let outcome = gate(StaticVerifier::accepting()).verify_any("evidence", "nonce", &[]);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_slow_verifier_times_out() {
        let gate = AttestationGate::new(Arc::new(SlowVerifier), Duration::from_millis(50));
        let outcome = gate.verify_any("evidence", "nonce", &["YWJj"]);
        assert_eq!(outcome, VerificationOutcome::TimedOut);
    }
}
