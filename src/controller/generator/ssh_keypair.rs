//! # SSH Keypair Generator
//!
//! Produces an RSA keypair: the private key as PKCS#1 PEM in `ssh-privatekey`
//! and the public key as an OpenSSH authorized-keys line in `ssh-publickey`.
//!
//! The key size comes from the length annotation, falling back to the
//! controller's `ssh_key_length`. A Secret that only carries the private key gets
//! its public key derived instead of a new keypair.

use crate::config::GeneratorConfig;
use crate::constants::MAX_SSH_KEY_LENGTH;
use crate::controller::generator::annotations::{ANNOTATION_SECURE, ANNOTATION_VALUE_YES};
use crate::controller::generator::{
    GenerationDirective, GenerationReport, Generator, GeneratorError,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

pub const FIELD_PRIVATE_KEY: &str = "ssh-privatekey";
pub const FIELD_PUBLIC_KEY: &str = "ssh-publickey";

const SSH_RSA: &str = "ssh-rsa";

#[derive(Debug, Clone)]
pub struct SshKeypairGenerator {
    config: GeneratorConfig,
}

impl SshKeypairGenerator {
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }
}

impl Generator for SshKeypairGenerator {
    fn generate_data(&self, secret: &mut Secret) -> Result<GenerationReport, GeneratorError> {
        let annotations = secret
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new);

        let directive = GenerationDirective::resolve(
            annotations,
            vec![FIELD_PRIVATE_KEY.to_string(), FIELD_PUBLIC_KEY.to_string()],
            self.config.ssh_key_length,
            MAX_SSH_KEY_LENGTH,
            &self.config,
        )?;

        let data = secret.data.get_or_insert_with(BTreeMap::new);
        let private_key = data
            .get(FIELD_PRIVATE_KEY)
            .filter(|value| !value.0.is_empty())
            .map(|value| Zeroizing::new(value.0.clone()));
        let has_public_key = data
            .get(FIELD_PUBLIC_KEY)
            .is_some_and(|value| !value.0.is_empty());

        if !directive.regeneration.is_requested() {
            if let Some(private_key) = private_key {
                if has_public_key {
                    debug!("keypair already present");
                    return Ok(GenerationReport::default());
                }

                match public_key_from_private_pem(&private_key) {
                    Ok(public_key) => {
                        info!(
                            field = FIELD_PUBLIC_KEY,
                            "derived missing public key from existing private key"
                        );
                        data.insert(
                            FIELD_PUBLIC_KEY.to_string(),
                            ByteString(public_key.into_bytes()),
                        );
                        return Ok(GenerationReport {
                            generated: vec![FIELD_PUBLIC_KEY.to_string()],
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "existing private key is unreadable, generating a new keypair");
                    }
                }
            }
        }

        let (private_pem, public_key) = generate_keypair(directive.length).inspect_err(|e| {
            error!(bits = directive.length, error = %e, "could not generate ssh keypair");
        })?;

        data.insert(
            FIELD_PRIVATE_KEY.to_string(),
            ByteString(private_pem.as_bytes().to_vec()),
        );
        data.insert(
            FIELD_PUBLIC_KEY.to_string(),
            ByteString(public_key.into_bytes()),
        );
        annotations.insert(
            ANNOTATION_SECURE.to_string(),
            ANNOTATION_VALUE_YES.to_string(),
        );

        info!(bits = directive.length, "generated new ssh keypair");

        Ok(GenerationReport {
            generated: directive.fields,
        })
    }
}

/// Generate an RSA keypair of `bits` bits.
///
/// Returns the PKCS#1 PEM private key and the authorized-keys public key line.
pub fn generate_keypair(bits: usize) -> Result<(Zeroizing<String>, String), GeneratorError> {
    let mut rng = OsRng;
    let key = RsaPrivateKey::new(&mut rng, bits)?;
    let pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| GeneratorError::KeyEncoding(e.to_string()))?;
    Ok((pem, authorized_key(&key.to_public_key())))
}

/// Derive the authorized-keys line from a PKCS#1 PEM private key
pub fn public_key_from_private_pem(pem: &[u8]) -> Result<String, GeneratorError> {
    let pem = std::str::from_utf8(pem).map_err(|e| GeneratorError::KeyEncoding(e.to_string()))?;
    let key = RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| GeneratorError::KeyEncoding(e.to_string()))?;
    Ok(authorized_key(&key.to_public_key()))
}

/// Render a public key as `ssh-rsa <base64 wire blob>\n`
#[must_use]
pub fn authorized_key(key: &RsaPublicKey) -> String {
    let mut blob = Vec::new();
    write_ssh_string(&mut blob, SSH_RSA.as_bytes());
    write_ssh_mpint(&mut blob, &key.e().to_bytes_be());
    write_ssh_mpint(&mut blob, &key.n().to_bytes_be());
    format!("{SSH_RSA} {}\n", STANDARD.encode(blob))
}

fn write_ssh_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "key blob components are far below 4 GiB"
    )]
    let len = bytes.len() as u32;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Two's complement big-endian integer: no leading zeros, a zero byte in front
/// when the top bit is set
fn write_ssh_mpint(buf: &mut Vec<u8>, magnitude: &[u8]) {
    let start = magnitude
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(magnitude.len());
    let trimmed = &magnitude[start..];

    if trimmed.first().is_some_and(|b| b & 0x80 != 0) {
        let mut padded = Vec::with_capacity(trimmed.len() + 1);
        padded.push(0);
        padded.extend_from_slice(trimmed);
        write_ssh_string(buf, &padded);
    } else {
        write_ssh_string(buf, trimmed);
    }
}
