// ABOUTME: Per-request backend credentials backed by secrecy so keys never reach logs.
// ABOUTME: BackendCredential pairs a backend selector with a SecretString value.

use std::fmt;

use secrecy::{ExposeSecret, SecretBox};

use crate::request::BackendKind;

/// A secret string whose `Debug` and `Display` output is always `[REDACTED]`.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value. Only call this where the value goes on the wire.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// True when the secret is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A credential for one backend, supplied by the hosting application per call.
///
/// The engine never persists credentials and never reads them from the
/// environment; the value lives exactly as long as the request carrying it.
#[derive(Clone, Debug)]
pub struct BackendCredential {
    backend: BackendKind,
    secret: SecretString,
}

impl BackendCredential {
    pub fn new(backend: BackendKind, secret: impl Into<SecretString>) -> Self {
        Self {
            backend,
            secret: secret.into(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Returns true if the credential can be used for `backend`.
    pub fn is_usable_for(&self, backend: BackendKind) -> bool {
        self.backend == backend && !self.secret.is_blank()
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.secret.expose())
    }
}
