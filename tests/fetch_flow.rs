//! End-to-end fetch flows: config load, attestation gating, resolution,
//! packaging, and sealing, driven through the orchestrator with a stub
//! verifier that behaves like the real one (checks the embedded report
//! data and the expected policy digest).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sealserve::attestation::{AttestationGate, Verifier};
use sealserve::config::Config;
use sealserve::crypto;
use sealserve::fetch::{
    expected_report_data, FetchError, FetchOptions, FetchOrchestrator, FetchPayload, FetchRequest,
};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Behaves like the external verifier: evidence is JSON carrying the report
/// data measured into it, and verification succeeds only when that value
/// matches the expected one and the policy digest is the measured one.
struct SimulatedVerifier {
    measured_digest: String,
}

impl Verifier for SimulatedVerifier {
    fn verify(&self, evidence: &str, expected_report_data: &str, policy_digest_b64: &str) -> i32 {
        let parsed: serde_json::Value = match serde_json::from_str(evidence) {
            Ok(v) => v,
            Err(_) => return 1,
        };
        if parsed.get("report_data").and_then(|v| v.as_str()) != Some(expected_report_data) {
            return 20; // report data mismatch
        }
        if policy_digest_b64 != self.measured_digest {
            return 32; // policy digest mismatch
        }
        0
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    orchestrator: FetchOrchestrator,
    private_key: rsa::RsaPrivateKey,
    wrapping_key_b64: String,
}

fn fixture(config_yaml: &str, measured_digest: &str, build: impl Fn(&Path)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path());
    let config_path = dir.path().join("config.yml");
    fs::write(&config_path, config_yaml).unwrap();

    let config = Arc::new(Config::load(&config_path, dir.path()).unwrap());
    let gate = AttestationGate::new(
        Arc::new(SimulatedVerifier {
            measured_digest: measured_digest.to_string(),
        }),
        Duration::from_secs(5),
    );
    let orchestrator = FetchOrchestrator::new(
        config,
        dir.path().to_path_buf(),
        gate,
        FetchOptions::default(),
    );

    let (private_key, public_key) = crypto::generate_key_pair(2048).unwrap();
    let wrapping_key_b64 = crypto::public_key_to_b64(&public_key).unwrap();

    Fixture {
        _dir: dir,
        orchestrator,
        private_key,
        wrapping_key_b64,
    }
}

/// Evidence whose embedded report data binds the given wrapping key.
fn evidence_for(wrapping_key_b64: &str) -> String {
    let evidence = serde_json::json!({
        "report_data": expected_report_data(wrapping_key_b64),
    });
    BASE64.encode(evidence.to_string())
}

fn body(attestation: &str, wrapping_key_b64: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "attestation": attestation,
        "wrapping_key": wrapping_key_b64,
    }))
    .unwrap()
}

fn fetch(fixture: &Fixture, target: &str, body: &[u8]) -> Result<FetchPayload, FetchError> {
    fixture.orchestrator.handle(FetchRequest {
        target,
        body,
        json: true,
    })
}

const SINGLE_FILE_CONFIG: &str =
    "serve:\n  - path: readme.md\n    policies: p1\nsecurity_policies:\n  p1: YWJj\n";

#[test]
fn fetch_file_decrypts_to_exact_contents() {
    let fx = fixture(SINGLE_FILE_CONFIG, "YWJj", |root| {
        fs::write(root.join("readme.md"), b"# readme\nconfidential contents\n").unwrap();
    });

    let body = body(&evidence_for(&fx.wrapping_key_b64), &fx.wrapping_key_b64);
    let FetchPayload::Sealed(envelope) = fetch(&fx, "readme.md", &body).unwrap() else {
        panic!("expected sealed payload");
    };

    let plaintext = crypto::open(&envelope, &fx.private_key).unwrap();
    assert_eq!(plaintext, b"# readme\nconfidential contents\n");
}

#[test]
fn mismatched_report_data_is_forbidden() {
    let fx = fixture(SINGLE_FILE_CONFIG, "YWJj", |root| {
        fs::write(root.join("readme.md"), b"contents").unwrap();
    });

    // Evidence bound to a different wrapping key: the embedded nonce no
    // longer matches what the server derives from this request.
    let stale_evidence = evidence_for("someone elses key");
    let body = body(&stale_evidence, &fx.wrapping_key_b64);
    assert_eq!(fetch(&fx, "readme.md", &body).unwrap_err(), FetchError::Forbidden);
}

#[test]
fn mismatched_policy_digest_is_forbidden() {
    // The verifier measured a digest the config does not serve under.
    let fx = fixture(SINGLE_FILE_CONFIG, "c3RyaWN0", |root| {
        fs::write(root.join("readme.md"), b"contents").unwrap();
    });

    let body = body(&evidence_for(&fx.wrapping_key_b64), &fx.wrapping_key_b64);
    assert_eq!(fetch(&fx, "readme.md", &body).unwrap_err(), FetchError::Forbidden);
}

#[test]
fn second_bound_policy_grants_access() {
    let config = "serve:\n  - path: readme.md\n    policies: [p1, p2]\n\
                  security_policies:\n  p1: YWJj\n  p2: ZGVm\n";
    // The environment measures p2's digest; p1 does not match.
    let fx = fixture(config, "ZGVm", |root| {
        fs::write(root.join("readme.md"), b"contents").unwrap();
    });

    let body = body(&evidence_for(&fx.wrapping_key_b64), &fx.wrapping_key_b64);
    assert!(fetch(&fx, "readme.md", &body).is_ok());
}

#[test]
fn unconfigured_and_missing_targets_are_indistinguishable() {
    let fx = fixture(SINGLE_FILE_CONFIG, "YWJj", |root| {
        fs::write(root.join("readme.md"), b"contents").unwrap();
        // On disk but not configured.
        fs::write(root.join("license"), b"MIT").unwrap();
    });

    let body = body(&evidence_for(&fx.wrapping_key_b64), &fx.wrapping_key_b64);
    let unconfigured = fetch(&fx, "license", &body).unwrap_err();
    let missing = fetch(&fx, "missing.md", &body).unwrap_err();
    assert_eq!(unconfigured, FetchError::NotFound);
    assert_eq!(unconfigured, missing);
}

#[test]
fn traversal_target_is_not_found() {
    let fx = fixture(SINGLE_FILE_CONFIG, "YWJj", |root| {
        fs::write(root.join("readme.md"), b"contents").unwrap();
    });

    let body = body(&evidence_for(&fx.wrapping_key_b64), &fx.wrapping_key_b64);
    assert_eq!(
        fetch(&fx, "../outside.md", &body).unwrap_err(),
        FetchError::NotFound
    );
}

#[test]
fn fetch_directory_decrypts_to_matching_archive() {
    let config = "serve:\n  - path: docs\n    policies: p1\nsecurity_policies:\n  p1: YWJj\n";
    let fx = fixture(config, "YWJj", |root| {
        fs::create_dir_all(root.join("docs/guides")).unwrap();
        fs::write(root.join("docs/index.md"), b"index").unwrap();
        fs::write(root.join("docs/guides/setup.md"), b"setup").unwrap();
    });

    let body = body(&evidence_for(&fx.wrapping_key_b64), &fx.wrapping_key_b64);
    let FetchPayload::Sealed(envelope) = fetch(&fx, "docs", &body).unwrap() else {
        panic!("expected sealed payload");
    };

    let archive_bytes = crypto::open(&envelope, &fx.private_key).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes)).unwrap();

    let mut names = Vec::new();
    for i in 0..archive.len() {
        names.push(archive.by_index(i).unwrap().name().to_string());
    }
    assert_eq!(names, vec!["guides/setup.md", "index.md"]);

    let mut setup = String::new();
    archive
        .by_name("guides/setup.md")
        .unwrap()
        .read_to_string(&mut setup)
        .unwrap();
    assert_eq!(setup, "setup");
}

#[test]
fn plain_mode_skips_attestation_and_sealing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.md"), b"open contents").unwrap();
    let config_path = dir.path().join("config.yml");
    fs::write(&config_path, SINGLE_FILE_CONFIG).unwrap();

    let config = Arc::new(Config::load(&config_path, dir.path()).unwrap());
    let gate = AttestationGate::new(
        Arc::new(SimulatedVerifier {
            measured_digest: "YWJj".to_string(),
        }),
        Duration::from_secs(5),
    );
    let orchestrator = FetchOrchestrator::new(
        config,
        dir.path().to_path_buf(),
        gate,
        FetchOptions {
            require_attestation: false,
            seal_response: false,
        },
    );

    let payload = orchestrator
        .handle(FetchRequest {
            target: "readme.md",
            body: b"{}",
            json: true,
        })
        .unwrap();
    let FetchPayload::Plain(bytes) = payload else {
        panic!("expected plain payload");
    };
    assert_eq!(bytes, b"open contents");
}
