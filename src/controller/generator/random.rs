//! # Random Value Encoder
//!
//! Produces cryptographically secure random bytes and renders them in one of the
//! supported text encodings.
//!
//! ## Length semantics
//!
//! Without the byte suffix, `length` is the number of characters the caller wants
//! in the final text. Every text encoding expands its input, so reading `length`
//! random bytes always covers `length` characters and the encoded text is cut to
//! exactly that size. With the byte suffix, `length` random bytes are read and the
//! whole encoding is returned untouched. `raw` output is never cut.

use crate::controller::generator::GeneratorError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Output encoding of a generated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Standard base64 with padding
    #[default]
    Base64,
    /// URL-safe base64 with padding
    Base64Url,
    /// RFC 4648 base32 with padding
    Base32,
    /// Lowercase hexadecimal
    Hex,
    /// Random bytes, unencoded
    Raw,
}

impl Encoding {
    /// Parse an encoding name. Unknown or empty names select standard base64.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "base64url" => Encoding::Base64Url,
            "base32" => Encoding::Base32,
            "hex" => Encoding::Hex,
            "raw" => Encoding::Raw,
            _ => Encoding::Base64,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Base64Url => "base64url",
            Encoding::Base32 => "base32",
            Encoding::Hex => "hex",
            Encoding::Raw => "raw",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of secure random bytes
pub trait EntropySource: Send + Sync + fmt::Debug {
    /// Fill `dest` completely or fail with [`GeneratorError::Entropy`]
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), GeneratorError>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), GeneratorError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| GeneratorError::Entropy(e.to_string()))
    }
}

/// Generate a random value from the OS CSPRNG
///
/// `encoding` is an encoding name as found in annotations.
pub fn generate_random_string(
    length: usize,
    encoding: &str,
    is_byte_length: bool,
) -> Result<Vec<u8>, GeneratorError> {
    generate_random_string_with(&OsEntropy, length, Encoding::parse(encoding), is_byte_length)
}

/// Generate a random value from the given entropy source
pub fn generate_random_string_with(
    entropy: &dyn EntropySource,
    length: usize,
    encoding: Encoding,
    is_byte_length: bool,
) -> Result<Vec<u8>, GeneratorError> {
    let mut bytes = Zeroizing::new(vec![0u8; length]);
    entropy.fill_bytes(bytes.as_mut_slice())?;

    let encoded = match encoding {
        Encoding::Raw => return Ok(bytes.to_vec()),
        Encoding::Base64 => STANDARD.encode(bytes.as_slice()),
        Encoding::Base64Url => URL_SAFE.encode(bytes.as_slice()),
        Encoding::Base32 => encode_base32(bytes.as_slice()),
        Encoding::Hex => hex::encode(bytes.as_slice()),
    };

    let mut encoded = encoded.into_bytes();
    if !is_byte_length {
        encoded.truncate(length);
    }
    Ok(encoded)
}

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// RFC 4648 base32, standard alphabet, padded to a multiple of 8 characters
fn encode_base32(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(5) * 8);

    for chunk in input.chunks(5) {
        let mut block = [0u8; 5];
        block[..chunk.len()].copy_from_slice(chunk);
        let bits = block
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));

        // Significant symbols per partial block: ceil(bytes * 8 / 5)
        let symbols = (chunk.len() * 8).div_ceil(5);
        for i in 0..8 {
            if i < symbols {
                #[allow(clippy::cast_possible_truncation, reason = "masked to 5 bits")]
                let index = ((bits >> (35 - i * 5)) & 0x1f) as usize;
                out.push(char::from(BASE32_ALPHABET[index]));
            } else {
                out.push('=');
            }
        }
    }

    out
}
