//! Server configuration — which targets are served, gated by which policies
//!
//! A configuration binds filesystem paths to named security policies, where
//! each policy is the base64 digest of an expected platform measurement.
//! Loading is all-or-nothing: the process must never start serving with a
//! partially valid configuration, so every binding is validated up front and
//! the first violation aborts the load.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Base64 charset with optional `=` padding, the shape every policy digest
/// in the registry must have.
const DIGEST_PATTERN: &str = r"^[A-Za-z0-9+/]+={0,2}$";

fn digest_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(DIGEST_PATTERN).expect("digest pattern is valid"))
}

/// One or many policy names attached to a served target.
///
/// The config file accepts either `policies: p1` or `policies: [p1, p2]`;
/// anything else fails deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PolicyRef {
    One(String),
    Many(Vec<String>),
}

impl PolicyRef {
    /// Iterate the referenced policy names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        match self {
            PolicyRef::One(name) => std::slice::from_ref(name).iter(),
            PolicyRef::Many(names) => names.iter(),
        }
        .map(String::as_str)
    }
}

/// A single served target: a path on disk plus the policies allowed to
/// fetch it.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetBinding {
    pub path: String,
    pub policies: PolicyRef,
}

/// Validated server configuration. Immutable after [`Config::load`];
/// request handling only ever reads it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Targets in declaration order.
    pub serve: Vec<TargetBinding>,
    /// Policy name -> base64 measurement digest.
    pub security_policies: BTreeMap<String, String>,
}

impl Config {
    /// Load and validate a YAML configuration file. Target paths are
    /// resolved against `root`, the same directory the server later serves
    /// from, so load-time validation and request-time resolution agree.
    pub fn load(path: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate(root.as_ref())?;
        log::info!(
            "loaded config: {} target(s), {} policy(ies)",
            config.serve.len(),
            config.security_policies.len()
        );
        Ok(config)
    }

    /// Look up the binding for a target name, if one is configured.
    pub fn binding(&self, target: &str) -> Option<&TargetBinding> {
        self.serve.iter().find(|t| t.path == target)
    }

    /// The full set of policy digests bound to a target, in declaration
    /// order. Empty when the target is not configured.
    pub fn digests_for(&self, target: &str) -> Vec<&str> {
        match self.binding(target) {
            Some(binding) => binding
                .policies
                .names()
                .filter_map(|name| self.security_policies.get(name))
                .map(String::as_str)
                .collect(),
            None => Vec::new(),
        }
    }

    fn validate(&self, root: &Path) -> Result<(), ConfigError> {
        for target in &self.serve {
            let path = root.join(&target.path);
            if !path.exists() {
                return Err(ConfigError::MissingPath {
                    path: target.path.clone(),
                });
            }
            Self::probe_readable(&path).map_err(|_| ConfigError::UnreadablePath {
                path: target.path.clone(),
            })?;

            for name in target.policies.names() {
                if !self.security_policies.contains_key(name) {
                    return Err(ConfigError::UnknownPolicy {
                        name: name.to_string(),
                    });
                }
            }
        }

        for (name, digest) in &self.security_policies {
            if !digest_regex().is_match(digest) {
                return Err(ConfigError::BadDigest { name: name.clone() });
            }
        }

        Ok(())
    }

    /// Open the path for reading to confirm access, covering both files and
    /// directories.
    fn probe_readable(path: &Path) -> std::io::Result<()> {
        if path.is_dir() {
            fs::read_dir(path).map(|_| ())
        } else {
            fs::File::open(path).map(|_| ())
        }
    }
}

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("path '{path}' does not exist")]
    MissingPath { path: String },

    #[error("path '{path}' is not readable")]
    UnreadablePath { path: String },

    #[error("policy '{name}' not found in security policies")]
    UnknownPolicy { name: String },

    #[error("security policy '{name}' is not valid base64")]
    BadDigest { name: String },
}
