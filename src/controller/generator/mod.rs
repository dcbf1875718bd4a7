//! # Generator
//!
//! Per-type strategies that decide which fields of a Secret need (re)generation,
//! produce the values and write them into the Secret in place.
//!
//! - `annotations`: annotation keys and typed accessors
//! - `directive`: per-pass generation directives (regeneration set, length, encoding)
//! - `random`: random value encoder
//! - `string`: random string fields
//! - `ssh_keypair`: RSA keypair in PEM / OpenSSH format
//! - `basic_auth`: username, password and htpasswd line

pub mod annotations;
pub mod basic_auth;
pub mod directive;
pub mod random;
pub mod ssh_keypair;
pub mod string;

pub use basic_auth::BasicAuthGenerator;
pub use directive::{GenerationDirective, RegenerationSet};
pub use random::{
    generate_random_string, generate_random_string_with, Encoding, EntropySource, OsEntropy,
};
pub use ssh_keypair::SshKeypairGenerator;
pub use string::StringGenerator;

use crate::config::GeneratorConfig;
use crate::constants::GENERATION_RETRY_SECS;
use k8s_openapi::api::core::v1::Secret;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("duplicate field {0:?} in autogenerate annotation")]
    DuplicateField(String),
    #[error("invalid length {value:?}: {source}")]
    InvalidLength {
        value: String,
        #[source]
        source: LengthError,
    },
    #[error("failed to read random bytes: {0}")]
    Entropy(String),
    #[error("failed to generate RSA key: {0}")]
    KeyGeneration(#[from] rsa::Error),
    #[error("failed to encode RSA key: {0}")]
    KeyEncoding(String),
    #[error("failed to hash basic-auth password: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

impl GeneratorError {
    /// Fixed delay after which a failed generation should be retried.
    ///
    /// Validation errors return `None`: retrying them unchanged cannot succeed,
    /// so the error policy falls back to its progressive backoff.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GeneratorError::DuplicateField(_) | GeneratorError::InvalidLength { .. } => None,
            GeneratorError::Entropy(_)
            | GeneratorError::KeyGeneration(_)
            | GeneratorError::KeyEncoding(_)
            | GeneratorError::PasswordHash(_) => Some(Duration::from_secs(GENERATION_RETRY_SECS)),
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.retry_after().is_none()
    }
}

/// Why a length annotation was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LengthError {
    #[error(transparent)]
    Parse(#[from] ParseIntError),
    #[error("exceeds the maximum of {max}")]
    TooLarge { max: usize },
}

/// Secret type declared by the type annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretType {
    String,
    SshKeypair,
    BasicAuth,
}

impl SecretType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::String => "string",
            SecretType::SshKeypair => "ssh-keypair",
            SecretType::BasicAuth => "basic-auth",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown secret type {0:?}")]
pub struct UnknownSecretType(pub String);

impl FromStr for SecretType {
    type Err = UnknownSecretType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SecretType::String),
            "ssh-keypair" => Ok(SecretType::SshKeypair),
            "basic-auth" => Ok(SecretType::BasicAuth),
            other => Err(UnknownSecretType(other.to_string())),
        }
    }
}

/// Fields written during one generation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub generated: Vec<String>,
}

impl GenerationReport {
    #[must_use]
    pub fn count(&self) -> usize {
        self.generated.len()
    }
}

/// A strategy that fills in one secret type
pub trait Generator: Send + Sync + fmt::Debug {
    /// Generate missing or requested fields of `secret` in place.
    ///
    /// On error, fields written earlier in the pass stay in `secret`; callers
    /// must not persist it.
    fn generate_data(&self, secret: &mut Secret) -> Result<GenerationReport, GeneratorError>;
}

/// Build the generator for `secret_type`
#[must_use]
pub fn generator_for(
    secret_type: SecretType,
    config: &GeneratorConfig,
    entropy: Arc<dyn EntropySource>,
) -> Box<dyn Generator> {
    match secret_type {
        SecretType::String => Box::new(StringGenerator::new(config.clone(), entropy)),
        SecretType::SshKeypair => Box::new(SshKeypairGenerator::new(config.clone())),
        SecretType::BasicAuth => Box::new(BasicAuthGenerator::new(config.clone(), entropy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_type_round_trip_names() {
        for secret_type in [
            SecretType::String,
            SecretType::SshKeypair,
            SecretType::BasicAuth,
        ] {
            assert_eq!(secret_type.as_str().parse::<SecretType>(), Ok(secret_type));
        }
    }

    #[test]
    fn test_unknown_secret_type() {
        assert_eq!(
            "".parse::<SecretType>(),
            Err(UnknownSecretType(String::new()))
        );
        assert!("String".parse::<SecretType>().is_err());
    }

    #[test]
    fn test_retry_directive_by_error_kind() {
        assert_eq!(
            GeneratorError::DuplicateField("a".to_string()).retry_after(),
            None
        );
        let invalid = "x".parse::<usize>().unwrap_err();
        assert!(GeneratorError::InvalidLength {
            value: "x".to_string(),
            source: invalid.into(),
        }
        .is_validation());
        assert!(GeneratorError::InvalidLength {
            value: "100000000000b".to_string(),
            source: LengthError::TooLarge { max: 16_384 },
        }
        .is_validation());
        assert_eq!(
            GeneratorError::Entropy("gone".to_string()).retry_after(),
            Some(Duration::from_secs(30))
        );
    }
}
