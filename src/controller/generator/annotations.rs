//! # Annotations
//!
//! The annotation keys that make up the controller's persisted state, and typed
//! accessors that read generation directives with fallback defaults.

use crate::controller::generator::{GeneratorError, LengthError};
use std::collections::BTreeMap;

/// Secret type (`string`, `ssh-keypair`, `basic-auth`)
pub const ANNOTATION_SECRET_TYPE: &str = "secret-generator.v1.mittwald.de/type";
/// Comma-separated list of fields to generate (string type)
pub const ANNOTATION_AUTOGENERATE: &str = "secret-generator.v1.mittwald.de/autogenerate";
/// Requested length, optionally suffixed with [`BYTE_SUFFIX`]
pub const ANNOTATION_LENGTH: &str = "secret-generator.v1.mittwald.de/length";
/// Output encoding of generated strings
pub const ANNOTATION_ENCODING: &str = "secret-generator.v1.mittwald.de/encoding";
/// Template wrapping the generated value
pub const ANNOTATION_TEMPLATE: &str = "secret-generator.v1.mittwald.de/template";
/// Regeneration request (`yes` or a field list), removed once honoured
pub const ANNOTATION_REGENERATE: &str = "secret-generator.v1.mittwald.de/regenerate";
/// Set once every field was produced by this controller
pub const ANNOTATION_SECURE: &str = "secret-generator.v1.mittwald.de/secure";
/// Timestamp of the last persisted update
pub const ANNOTATION_GENERATED_AT: &str =
    "secret-generator.v1.mittwald.de/autogenerate-generated-at";
/// Username for basic-auth Secrets
pub const ANNOTATION_BASIC_AUTH_USERNAME: &str =
    "secret-generator.v1.mittwald.de/basic-auth-username";

/// Length suffix marking a raw byte count instead of an output character count
pub const BYTE_SUFFIX: &str = "b";

/// Placeholder replaced by the generated value inside a template
pub const TEMPLATE_PLACEHOLDER: &str = "${SECRET}";

/// Value written to the secure marker and accepted as "regenerate everything"
pub const ANNOTATION_VALUE_YES: &str = "yes";

/// Default basic-auth username
pub const DEFAULT_BASIC_AUTH_USERNAME: &str = "admin";

pub type Annotations = BTreeMap<String, String>;

/// Length annotation value, or the fallback rendered as a plain character count
pub fn length_from_annotation(fallback: usize, annotations: &Annotations) -> String {
    annotations
        .get(ANNOTATION_LENGTH)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

pub fn encoding_from_annotation(fallback: &str, annotations: &Annotations) -> String {
    annotations
        .get(ANNOTATION_ENCODING)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

pub fn template_from_annotation(fallback: &str, annotations: &Annotations) -> String {
    annotations
        .get(ANNOTATION_TEMPLATE)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// Basic-auth username; an empty annotation counts as unset
pub fn username_from_annotation(fallback: &str, annotations: &Annotations) -> String {
    annotations
        .get(ANNOTATION_BASIC_AUTH_USERNAME)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// Parse a length annotation value into `(length, is_byte_length)`
///
/// `"32"` is 32 output characters, `"32b"` is 32 random bytes. Lengths above
/// `max` are rejected.
pub fn parse_byte_length(value: &str, max: usize) -> Result<(usize, bool), GeneratorError> {
    let trimmed = value.trim();
    let (number, is_byte_length) = match trimmed.strip_suffix(BYTE_SUFFIX) {
        Some(number) => (number, true),
        None => (trimmed, false),
    };

    let length = number
        .parse::<usize>()
        .map_err(|source| GeneratorError::InvalidLength {
            value: value.to_string(),
            source: source.into(),
        })?;

    if length > max {
        return Err(GeneratorError::InvalidLength {
            value: value.to_string(),
            source: LengthError::TooLarge { max },
        });
    }

    Ok((length, is_byte_length))
}

/// Split a comma-separated field list, dropping blank entries
pub fn split_fields(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(ToString::to_string)
        .collect()
}
