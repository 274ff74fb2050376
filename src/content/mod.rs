//! Served content — target resolution and packaging
//!
//! - **Access**: resolve a requested target name against the serving root,
//!   confined so no request can escape it
//! - **Archive**: turn a resolved target into bytes — raw for a file, a
//!   deterministic ZIP for a directory

pub mod access;
pub mod archive;

pub use access::{resolve, AccessError, ResolvedTarget, TargetKind};
pub use archive::{package, PackageError};
