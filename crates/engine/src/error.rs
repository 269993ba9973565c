// ABOUTME: Error taxonomy for extraction requests: ErrorKind enum and ExtractError struct.
// ABOUTME: Provides one constructor per kind, boolean helpers and the stable wire name used by envelopes.

use std::fmt;

/// Categories of extraction failure.
///
/// The wire name returned by [`ErrorKind::as_str`] is what callers see in
/// `ResultEnvelope.error.kind`, so variants are never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    MissingCredential,
    FetchFailure,
    ParseFailure,
    BackendUnavailable,
    Timeout,
    InvalidConfiguration,
    UnsupportedOperation,
}

impl ErrorKind {
    /// Stable identifier used in serialized envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::MissingCredential => "MissingCredential",
            ErrorKind::FetchFailure => "FetchFailure",
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::InvalidConfiguration => "InvalidConfiguration",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::MissingCredential => "missing credential",
            ErrorKind::FetchFailure => "fetch failure",
            ErrorKind::ParseFailure => "parse failure",
            ErrorKind::BackendUnavailable => "backend unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidConfiguration => "invalid configuration",
            ErrorKind::UnsupportedOperation => "unsupported operation",
        };
        write!(f, "{}", s)
    }
}

/// The error type for every fallible operation in the engine.
///
/// `target` is whatever the operation was aimed at (a page URL, a crawl id,
/// a graph kind) and `op` names the operation, e.g. `"Fetch"` or `"Poll"`.
#[derive(Debug, thiserror::Error)]
pub struct ExtractError {
    pub kind: ErrorKind,
    pub target: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "siphon: {}", self.op)?;
        if !self.target.is_empty() {
            write!(f, " {}", self.target)?;
        }
        write!(f, ": {}", self.kind)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ExtractError {
    fn with_kind(
        kind: ErrorKind,
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidRequest error.
    pub fn invalid_request(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::InvalidRequest, target, op, source)
    }

    /// Create a MissingCredential error.
    pub fn missing_credential(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::MissingCredential, target, op, source)
    }

    /// Create a FetchFailure error.
    pub fn fetch(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::FetchFailure, target, op, source)
    }

    /// Create a ParseFailure error.
    pub fn parse(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::ParseFailure, target, op, source)
    }

    /// Create a BackendUnavailable error.
    pub fn backend_unavailable(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::BackendUnavailable, target, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::Timeout, target, op, source)
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::InvalidConfiguration, target, op, source)
    }

    /// Create an UnsupportedOperation error.
    pub fn unsupported(
        target: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(ErrorKind::UnsupportedOperation, target, op, source)
    }

    /// Human readable message without the `siphon: op target` prefix.
    pub fn message(&self) -> String {
        match self.source {
            Some(ref src) => format!("{}: {}", self.kind, src),
            None => self.kind.to_string(),
        }
    }

    pub fn is_invalid_request(&self) -> bool {
        self.kind == ErrorKind::InvalidRequest
    }

    pub fn is_missing_credential(&self) -> bool {
        self.kind == ErrorKind::MissingCredential
    }

    pub fn is_fetch(&self) -> bool {
        self.kind == ErrorKind::FetchFailure
    }

    pub fn is_parse(&self) -> bool {
        self.kind == ErrorKind::ParseFailure
    }

    pub fn is_backend_unavailable(&self) -> bool {
        self.kind == ErrorKind::BackendUnavailable
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_invalid_configuration(&self) -> bool {
        self.kind == ErrorKind::InvalidConfiguration
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind == ErrorKind::UnsupportedOperation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_target_and_cause() {
        let err = ExtractError::fetch(
            "https://example.com",
            "Fetch",
            Some(anyhow::anyhow!("HTTP status 503")),
        );
        assert_eq!(
            err.to_string(),
            "siphon: Fetch https://example.com: fetch failure: HTTP status 503"
        );
        assert_eq!(err.message(), "fetch failure: HTTP status 503");
        assert!(err.is_fetch());
    }

    #[test]
    fn display_omits_empty_target() {
        let err = ExtractError::missing_credential("", "Run", None);
        assert_eq!(err.to_string(), "siphon: Run: missing credential");
    }

    #[test]
    fn wire_names_are_stable() {
        assert_eq!(ErrorKind::InvalidRequest.as_str(), "InvalidRequest");
        assert_eq!(ErrorKind::BackendUnavailable.as_str(), "BackendUnavailable");
        assert_eq!(ErrorKind::UnsupportedOperation.as_str(), "UnsupportedOperation");
    }
}
