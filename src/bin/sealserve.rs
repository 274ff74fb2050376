//! sealserve CLI — run the server, generate wrapping keys, open envelopes
//!
//! Commands:
//!   sealserve serve   — serve configured targets over HTTP
//!   sealserve keygen  — generate an RSA wrapping key pair
//!   sealserve open    — decrypt a sealed envelope with a private key

use clap::{Parser, Subcommand};
use sealserve::attestation::{AttestationGate, ProcessVerifier, StaticVerifier, Verifier};
use sealserve::config::Config;
use sealserve::crypto;
use sealserve::fetch::{FetchOptions, FetchOrchestrator};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sealserve", version, about = "Attestation-gated confidential content server")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve configured targets over HTTP
    Serve {
        /// Path to the YAML config file
        #[arg(long)]
        config: PathBuf,

        /// Directory targets are served from
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8000")]
        listen: String,

        /// Attestation verifier executable
        #[arg(long, default_value = "verify_attestation_ccf")]
        verifier: String,

        /// Upper bound on one verifier invocation, in seconds
        #[arg(long, default_value_t = 30)]
        verifier_timeout_secs: u64,

        /// Skip attestation verification (development only)
        #[arg(long)]
        no_attestation: bool,
    },

    /// Generate an RSA wrapping key pair as PEM files
    Keygen {
        /// Modulus size in bits
        #[arg(long, default_value_t = 2048)]
        bits: usize,

        /// Where to write the private key
        #[arg(long, default_value = "private_key.pem")]
        private_key: PathBuf,

        /// Where to write the public key
        #[arg(long, default_value = "public_key.pem")]
        public_key: PathBuf,
    },

    /// Decrypt a sealed envelope (JSON on stdin) with a private key
    Open {
        /// Path to the PEM private key
        #[arg(long)]
        private_key: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        CliCommand::Serve {
            config,
            root,
            listen,
            verifier,
            verifier_timeout_secs,
            no_attestation,
        } => {
            // A partially valid configuration must never serve; load errors
            // are fatal here.
            let config = Arc::new(Config::load(&config, &root)?);

            let verifier: Arc<dyn Verifier> = if no_attestation {
                log::warn!("attestation verification disabled; do not use in production");
                Arc::new(StaticVerifier::accepting())
            } else {
                Arc::new(ProcessVerifier::new(verifier))
            };
            let gate =
                AttestationGate::new(verifier, Duration::from_secs(verifier_timeout_secs));

            let options = FetchOptions {
                require_attestation: !no_attestation,
                seal_response: true,
            };
            let orchestrator =
                Arc::new(FetchOrchestrator::new(config, root, gate, options));
            sealserve::server::serve(&listen, orchestrator).await?;
        }

        CliCommand::Keygen {
            bits,
            private_key,
            public_key,
        } => {
            log::info!("generating {bits}-bit RSA key pair");
            let (private, public) = crypto::generate_key_pair(bits)?;
            std::fs::write(&private_key, crypto::private_key_to_pem(&private)?)?;
            std::fs::write(&public_key, crypto::keys::public_key_to_pem(&public)?)?;
            println!("{}", crypto::public_key_to_b64(&public)?);
        }

        CliCommand::Open { private_key } => {
            let pem = std::fs::read_to_string(&private_key)?;
            let private = crypto::private_key_from_pem(&pem)?;
            let envelope: crypto::EncryptedEnvelope =
                serde_json::from_reader(std::io::stdin())?;
            let plaintext = crypto::open(&envelope, &private)?;
            std::io::stdout().write_all(&plaintext)?;
        }
    }

    Ok(())
}
