//! Backends: the external imaging tools that carry out operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operation::OperationKind;

/// An external imaging tool.
///
/// Closed set: every backend the core can drive is a variant here, so there
/// is no such thing as an unknown backend once a value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The Windows Deployment Image Servicing and Management tool.
    Dism,
    /// The portable `wimlib-imagex` tool.
    #[serde(alias = "wimlib-imagex")]
    Wimlib,
}

impl Backend {
    /// Every backend, in declaration order.
    pub const ALL: [Backend; 2] = [Backend::Dism, Backend::Wimlib];

    /// Short name used in configuration and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Dism => "dism",
            Backend::Wimlib => "wimlib",
        }
    }

    /// Program name placed in a freshly built command.
    pub fn program(self) -> &'static str {
        match self {
            Backend::Dism => "dism",
            Backend::Wimlib => "wimlib-imagex",
        }
    }

    /// Executable file names to look for, most specific first.
    pub fn executable_names(self) -> &'static [&'static str] {
        match self {
            Backend::Dism => &["dism.exe", "dism"],
            Backend::Wimlib => &["wimlib-imagex.exe", "wimlib-imagex"],
        }
    }

    /// Whether this tool ships with the operating system (and so only
    /// exists on that platform).
    pub fn is_platform_native(self) -> bool {
        matches!(self, Backend::Dism)
    }

    /// Whether this backend can perform the given kind of operation.
    pub fn supports(self, kind: OperationKind) -> bool {
        !matches!((self, kind), (Backend::Wimlib, OperationKind::ListMounts))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognized backend or mode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend '{0}' (expected auto, dism or wimlib)")]
pub struct ParseBackendError(pub String);

impl FromStr for Backend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dism" | "dism.exe" => Ok(Backend::Dism),
            "wimlib" | "wimlib-imagex" | "wimlib-imagex.exe" => Ok(Backend::Wimlib),
            _ => Err(ParseBackendError(s.to_string())),
        }
    }
}

/// How the backend for an operation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendMode {
    /// Pick the first available backend from the preference order.
    #[default]
    Auto,
    /// Always use this backend, failing if it is missing.
    Explicit(Backend),
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Auto => f.write_str("auto"),
            BackendMode::Explicit(backend) => write!(f, "{}", backend),
        }
    }
}

impl FromStr for BackendMode {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(BackendMode::Auto);
        }
        s.parse().map(BackendMode::Explicit)
    }
}

impl TryFrom<String> for BackendMode {
    type Error = ParseBackendError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendMode> for String {
    fn from(mode: BackendMode) -> Self {
        mode.to_string()
    }
}
