//! # Generation Directive
//!
//! Decisions derived from a Secret's annotations at the start of every pass.
//! Nothing here is persisted: the directive is rebuilt from the annotations on
//! each reconciliation.

use crate::config::GeneratorConfig;
use crate::controller::generator::annotations::{
    encoding_from_annotation, length_from_annotation, parse_byte_length, split_fields,
    template_from_annotation, Annotations, ANNOTATION_REGENERATE, ANNOTATION_SECURE,
    ANNOTATION_VALUE_YES, TEMPLATE_PLACEHOLDER,
};
use crate::controller::generator::{Encoding, GeneratorError};
use std::collections::HashSet;
use tracing::info;

/// Fields that must be regenerated even when they already hold a value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegenerationSet {
    #[default]
    None,
    All,
    Fields(Vec<String>),
}

impl RegenerationSet {
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        match self {
            RegenerationSet::None => false,
            RegenerationSet::All => true,
            RegenerationSet::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }

    /// True when at least one field was requested
    #[must_use]
    pub fn is_requested(&self) -> bool {
        match self {
            RegenerationSet::None => false,
            RegenerationSet::All => true,
            RegenerationSet::Fields(fields) => !fields.is_empty(),
        }
    }

    /// Work out which fields to regenerate, consuming the regenerate annotation.
    ///
    /// A Secret without the secure marker is treated as produced by a weak generator
    /// when the insecure policy is on; every field is regenerated and the regenerate
    /// annotation is left for a later pass.
    pub fn resolve(annotations: &mut Annotations, config: &GeneratorConfig) -> Self {
        if !annotations.contains_key(ANNOTATION_SECURE) && config.regenerate_insecure {
            info!("secret was generated by a cryptographically insecure generator, regenerating all fields");
            return RegenerationSet::All;
        }

        match annotations.remove(ANNOTATION_REGENERATE) {
            Some(value) => {
                info!(request = value.as_str(), "removing regenerate annotation from secret");
                if value.trim() == ANNOTATION_VALUE_YES {
                    RegenerationSet::All
                } else {
                    RegenerationSet::Fields(split_fields(&value))
                }
            }
            None => RegenerationSet::None,
        }
    }
}

/// Per-pass generation directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationDirective {
    /// Fields to generate, in annotation order
    pub fields: Vec<String>,
    pub regeneration: RegenerationSet,
    pub length: usize,
    /// `length` counts random bytes rather than output characters
    pub is_byte_length: bool,
    pub encoding: Encoding,
    pub template: String,
}

impl GenerationDirective {
    /// Resolve the directive for `fields`.
    ///
    /// `default_length` applies when the Secret has no length annotation;
    /// lengths above `max_length` are rejected. The regenerate annotation is
    /// removed from `annotations` when present.
    pub fn resolve(
        annotations: &mut Annotations,
        fields: Vec<String>,
        default_length: usize,
        max_length: usize,
        config: &GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        let regeneration = RegenerationSet::resolve(annotations, config);

        let length = length_from_annotation(default_length, annotations);
        let (length, is_byte_length) = parse_byte_length(&length, max_length)?;
        let encoding = Encoding::parse(&encoding_from_annotation(
            &config.secret_encoding,
            annotations,
        ));
        let template = template_from_annotation(TEMPLATE_PLACEHOLDER, annotations);

        Ok(Self {
            fields,
            regeneration,
            length,
            is_byte_length,
            encoding,
            template,
        })
    }

    /// Substitute `value` for every placeholder in the template
    #[must_use]
    pub fn render(&self, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.template.len() + value.len());
        let mut parts = self.template.split(TEMPLATE_PLACEHOLDER);
        if let Some(first) = parts.next() {
            out.extend_from_slice(first.as_bytes());
        }
        for part in parts {
            out.extend_from_slice(value);
            out.extend_from_slice(part.as_bytes());
        }
        out
    }
}

/// Reject field lists that name the same field twice
pub fn ensure_unique(fields: &[String]) -> Result<(), GeneratorError> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !seen.insert(field.as_str()) {
            return Err(GeneratorError::DuplicateField(field.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_SECRET_LENGTH;
    use crate::controller::generator::annotations::{ANNOTATION_LENGTH, ANNOTATION_TEMPLATE};

    fn directive_with_template(template: &str) -> GenerationDirective {
        GenerationDirective {
            fields: vec!["password".to_string()],
            regeneration: RegenerationSet::None,
            length: 3,
            is_byte_length: false,
            encoding: Encoding::Base64,
            template: template.to_string(),
        }
    }

    #[test]
    fn test_render_default_template() {
        let directive = directive_with_template(TEMPLATE_PLACEHOLDER);
        assert_eq!(directive.render(b"XYZ"), b"XYZ");
    }

    #[test]
    fn test_render_prefix_suffix() {
        let directive = directive_with_template("prefix-${SECRET}-suffix");
        assert_eq!(directive.render(b"XYZ"), b"prefix-XYZ-suffix");
    }

    #[test]
    fn test_render_every_occurrence() {
        let directive = directive_with_template("${SECRET}:${SECRET}");
        assert_eq!(directive.render(b"ab"), b"ab:ab");
    }

    #[test]
    fn test_render_without_placeholder_is_constant() {
        let directive = directive_with_template("static");
        assert_eq!(directive.render(b"ignored"), b"static");
    }

    #[test]
    fn test_ensure_unique() {
        let fields = vec!["a".to_string(), "b".to_string()];
        assert!(ensure_unique(&fields).is_ok());

        let fields = vec!["a".to_string(), "a".to_string()];
        match ensure_unique(&fields) {
            Err(GeneratorError::DuplicateField(field)) => assert_eq!(field, "a"),
            other => panic!("expected duplicate field error, got {other:?}"),
        }
    }

    #[test]
    fn test_regeneration_yes_consumes_annotation() {
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_REGENERATE.to_string(), "yes".to_string());
        let set = RegenerationSet::resolve(&mut annotations, &GeneratorConfig::default());
        assert_eq!(set, RegenerationSet::All);
        assert!(!annotations.contains_key(ANNOTATION_REGENERATE));
    }

    #[test]
    fn test_regeneration_subset() {
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_REGENERATE.to_string(), "a,c".to_string());
        let set = RegenerationSet::resolve(&mut annotations, &GeneratorConfig::default());
        assert!(set.contains("a"));
        assert!(!set.contains("b"));
        assert!(set.contains("c"));
    }

    #[test]
    fn test_insecure_policy_regenerates_all_and_keeps_request() {
        let config = GeneratorConfig {
            regenerate_insecure: true,
            ..GeneratorConfig::default()
        };
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_REGENERATE.to_string(), "a".to_string());
        let set = RegenerationSet::resolve(&mut annotations, &config);
        assert_eq!(set, RegenerationSet::All);
        assert!(annotations.contains_key(ANNOTATION_REGENERATE));
    }

    #[test]
    fn test_insecure_policy_ignored_for_secure_secrets() {
        let config = GeneratorConfig {
            regenerate_insecure: true,
            ..GeneratorConfig::default()
        };
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_SECURE.to_string(), "yes".to_string());
        let set = RegenerationSet::resolve(&mut annotations, &config);
        assert_eq!(set, RegenerationSet::None);
    }

    #[test]
    fn test_resolve_reads_length_and_template() {
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_LENGTH.to_string(), "16b".to_string());
        annotations.insert(ANNOTATION_TEMPLATE.to_string(), "x-${SECRET}".to_string());
        let directive = GenerationDirective::resolve(
            &mut annotations,
            vec!["a".to_string()],
            40,
            MAX_SECRET_LENGTH,
            &GeneratorConfig::default(),
        )
        .unwrap();
        assert_eq!(directive.length, 16);
        assert!(directive.is_byte_length);
        assert_eq!(directive.encoding, Encoding::Base64);
        assert_eq!(directive.template, "x-${SECRET}");
    }

    #[test]
    fn test_resolve_rejects_oversized_length() {
        let mut annotations = Annotations::new();
        annotations.insert(
            ANNOTATION_LENGTH.to_string(),
            "18446744073709551615".to_string(),
        );
        let result = GenerationDirective::resolve(
            &mut annotations,
            vec!["a".to_string()],
            40,
            MAX_SECRET_LENGTH,
            &GeneratorConfig::default(),
        );
        assert!(matches!(result, Err(GeneratorError::InvalidLength { .. })));
    }
}
