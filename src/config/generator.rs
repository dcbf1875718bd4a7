//! # Generator Policy
//!
//! Process-wide knobs for secret generation. Per-resource annotations override the
//! length and encoding defaults; the remaining values apply to every Secret.

use crate::config::{env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BCRYPT_COST, DEFAULT_SECRET_ENCODING, DEFAULT_SECRET_LENGTH, DEFAULT_SSH_KEY_LENGTH,
};

/// Generator policy passed to every generator at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Regenerate every field of Secrets that lack the secure marker.
    /// Used to rotate values produced by older, non-cryptographic generators.
    pub regenerate_insecure: bool,
    /// Default length when the Secret has no length annotation
    pub secret_length: usize,
    /// Default encoding when the Secret has no encoding annotation
    pub secret_encoding: String,
    /// Default RSA key size (bits) for ssh-keypair Secrets
    pub ssh_key_length: usize,
    /// bcrypt cost for basic-auth hashes
    pub bcrypt_cost: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            regenerate_insecure: false,
            secret_length: DEFAULT_SECRET_LENGTH,
            secret_encoding: DEFAULT_SECRET_ENCODING.to_string(),
            ssh_key_length: DEFAULT_SSH_KEY_LENGTH,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl GeneratorConfig {
    /// Load the generator policy from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            regenerate_insecure: env_var_or_default_bool("REGENERATE_INSECURE", false),
            secret_length: env_var_or_default("SECRET_LENGTH", DEFAULT_SECRET_LENGTH),
            secret_encoding: env_var_or_default_str("SECRET_ENCODING", DEFAULT_SECRET_ENCODING),
            ssh_key_length: env_var_or_default("SSH_KEY_LENGTH", DEFAULT_SSH_KEY_LENGTH),
            bcrypt_cost: env_var_or_default("BCRYPT_COST", DEFAULT_BCRYPT_COST),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = GeneratorConfig::default();
        assert!(!config.regenerate_insecure);
        assert_eq!(config.secret_length, 40);
        assert_eq!(config.secret_encoding, "base64");
        assert_eq!(config.ssh_key_length, 4096);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }
}
