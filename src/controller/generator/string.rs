//! # String Generator
//!
//! Fills the fields listed in the autogenerate annotation with random strings.
//!
//! A field that already holds a value is kept unless it is part of the
//! regeneration set. When every listed field was written in the same pass the
//! Secret is marked secure.

use crate::config::GeneratorConfig;
use crate::constants::MAX_SECRET_LENGTH;
use crate::controller::generator::annotations::{
    split_fields, ANNOTATION_AUTOGENERATE, ANNOTATION_SECURE, ANNOTATION_VALUE_YES,
};
use crate::controller::generator::directive::ensure_unique;
use crate::controller::generator::{
    generate_random_string_with, EntropySource, GenerationDirective, GenerationReport, Generator,
    GeneratorError,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct StringGenerator {
    config: GeneratorConfig,
    entropy: Arc<dyn EntropySource>,
}

impl StringGenerator {
    #[must_use]
    pub fn new(config: GeneratorConfig, entropy: Arc<dyn EntropySource>) -> Self {
        Self { config, entropy }
    }
}

impl Generator for StringGenerator {
    fn generate_data(&self, secret: &mut Secret) -> Result<GenerationReport, GeneratorError> {
        let annotations = secret
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new);

        let fields = annotations
            .get(ANNOTATION_AUTOGENERATE)
            .map(|value| split_fields(value))
            .unwrap_or_default();
        ensure_unique(&fields)?;

        if fields.is_empty() {
            debug!("autogenerate annotation lists no fields, nothing to generate");
            return Ok(GenerationReport::default());
        }

        let directive = GenerationDirective::resolve(
            annotations,
            fields,
            self.config.secret_length,
            MAX_SECRET_LENGTH,
            &self.config,
        )?;

        let data = secret.data.get_or_insert_with(BTreeMap::new);
        let mut report = GenerationReport::default();

        for field in &directive.fields {
            let has_value = data.get(field).is_some_and(|value| !value.0.is_empty());
            if has_value && !directive.regeneration.contains(field) {
                // keep existing values unless queued for regeneration
                continue;
            }

            let value = generate_random_string_with(
                self.entropy.as_ref(),
                directive.length,
                directive.encoding,
                directive.is_byte_length,
            )
            .inspect_err(|e| {
                error!(field = field.as_str(), error = %e, "could not generate new random string");
            })?;
            let value = directive.render(&value);

            info!(
                field = field.as_str(),
                bytes = value.len(),
                encoding = %directive.encoding,
                "set field of secret to new randomly generated value"
            );
            data.insert(field.clone(), ByteString(value));
            report.generated.push(field.clone());
        }

        info!(count = report.count(), "generated secrets");

        if report.count() == directive.fields.len() {
            // every field now comes from this generator
            annotations.insert(
                ANNOTATION_SECURE.to_string(),
                ANNOTATION_VALUE_YES.to_string(),
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::generator::annotations::{
        ANNOTATION_ENCODING, ANNOTATION_LENGTH, ANNOTATION_REGENERATE, ANNOTATION_TEMPLATE,
    };
    use crate::controller::generator::OsEntropy;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds for the first `remaining` reads, then fails
    #[derive(Debug)]
    struct FlakyEntropy {
        remaining: AtomicUsize,
    }

    impl EntropySource for FlakyEntropy {
        fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), GeneratorError> {
            if self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                return Err(GeneratorError::Entropy("entropy pool exhausted".to_string()));
            }
            OsEntropy.fill_bytes(dest)
        }
    }

    fn secret(annotations: &[(&str, &str)], data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("default".to_string()),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        }
    }

    fn generator() -> StringGenerator {
        StringGenerator::new(GeneratorConfig::default(), Arc::new(OsEntropy))
    }

    fn field<'a>(secret: &'a Secret, name: &str) -> Option<&'a [u8]> {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(name))
            .map(|v| v.0.as_slice())
    }

    fn annotation<'a>(secret: &'a Secret, key: &str) -> Option<&'a str> {
        secret
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    #[test]
    fn test_generates_all_fields_and_marks_secure() {
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "password,token")], &[]);
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.generated, vec!["password", "token"]);
        assert_eq!(field(&s, "password").unwrap().len(), 40);
        assert_eq!(field(&s, "token").unwrap().len(), 40);
        assert_ne!(field(&s, "password"), field(&s, "token"));
        assert_eq!(annotation(&s, ANNOTATION_SECURE), Some("yes"));
    }

    #[test]
    fn test_only_missing_fields_are_generated() {
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "x,y")], &[("x", "v")]);
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.generated, vec!["y"]);
        assert_eq!(field(&s, "x"), Some(b"v".as_slice()));
        assert!(field(&s, "y").is_some());
        assert_eq!(annotation(&s, ANNOTATION_SECURE), None);
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "x")], &[("x", "")]);
        let report = generator().generate_data(&mut s).unwrap();
        assert_eq!(report.generated, vec!["x"]);
    }

    #[test]
    fn test_duplicate_fields_fail_without_mutation() {
        let mut s = secret(
            &[
                (ANNOTATION_AUTOGENERATE, "a,a"),
                (ANNOTATION_REGENERATE, "yes"),
            ],
            &[],
        );
        let before = s.clone();
        let result = generator().generate_data(&mut s);

        assert!(matches!(result, Err(GeneratorError::DuplicateField(ref f)) if f == "a"));
        assert_eq!(s, before);
    }

    #[test]
    fn test_regenerate_yes_rotates_all_and_removes_request() {
        let mut s = secret(
            &[
                (ANNOTATION_AUTOGENERATE, "a,b"),
                (ANNOTATION_REGENERATE, "yes"),
                (ANNOTATION_SECURE, "yes"),
            ],
            &[("a", "old-a"), ("b", "old-b")],
        );
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.count(), 2);
        assert_ne!(field(&s, "a"), Some(b"old-a".as_slice()));
        assert_ne!(field(&s, "b"), Some(b"old-b".as_slice()));
        assert_eq!(annotation(&s, ANNOTATION_REGENERATE), None);
    }

    #[test]
    fn test_regenerate_subset() {
        let mut s = secret(
            &[
                (ANNOTATION_AUTOGENERATE, "a,b"),
                (ANNOTATION_REGENERATE, "b"),
                (ANNOTATION_SECURE, "yes"),
            ],
            &[("a", "old-a"), ("b", "old-b")],
        );
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.generated, vec!["b"]);
        assert_eq!(field(&s, "a"), Some(b"old-a".as_slice()));
        assert_ne!(field(&s, "b"), Some(b"old-b".as_slice()));
    }

    #[test]
    fn test_insecure_policy_regenerates_populated_fields() {
        let config = GeneratorConfig {
            regenerate_insecure: true,
            ..GeneratorConfig::default()
        };
        let generator = StringGenerator::new(config, Arc::new(OsEntropy));
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "a")], &[("a", "weak")]);
        let report = generator.generate_data(&mut s).unwrap();

        assert_eq!(report.generated, vec!["a"]);
        assert_ne!(field(&s, "a"), Some(b"weak".as_slice()));
        assert_eq!(annotation(&s, ANNOTATION_SECURE), Some("yes"));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "a,b")], &[]);
        generator().generate_data(&mut s).unwrap();
        let after_first = s.clone();

        let report = generator().generate_data(&mut s).unwrap();
        assert_eq!(report.count(), 0);
        assert_eq!(s, after_first);
    }

    #[test]
    fn test_length_encoding_and_template() {
        let mut s = secret(
            &[
                (ANNOTATION_AUTOGENERATE, "url"),
                (ANNOTATION_LENGTH, "8b"),
                (ANNOTATION_ENCODING, "hex"),
                (ANNOTATION_TEMPLATE, "postgres://app:${SECRET}@db/app"),
            ],
            &[],
        );
        generator().generate_data(&mut s).unwrap();

        let value = String::from_utf8(field(&s, "url").unwrap().to_vec()).unwrap();
        let secret_part = value
            .strip_prefix("postgres://app:")
            .and_then(|rest| rest.strip_suffix("@db/app"))
            .unwrap();
        assert_eq!(secret_part.len(), 16);
        assert!(secret_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_invalid_length_is_validation_error() {
        let mut s = secret(
            &[(ANNOTATION_AUTOGENERATE, "a"), (ANNOTATION_LENGTH, "long")],
            &[],
        );
        let err = generator().generate_data(&mut s).unwrap_err();
        assert!(err.is_validation());
        assert!(field(&s, "a").is_none());
    }

    #[test]
    fn test_oversized_length_is_rejected_before_allocation() {
        for length in ["18446744073709551615", "100000000000b"] {
            let mut s = secret(
                &[(ANNOTATION_AUTOGENERATE, "a"), (ANNOTATION_LENGTH, length)],
                &[],
            );
            let err = generator().generate_data(&mut s).unwrap_err();
            assert!(err.is_validation(), "{length:?} should be a validation error");
            assert!(field(&s, "a").is_none());
        }
    }

    #[test]
    fn test_entropy_failure_keeps_partial_progress() {
        let generator = StringGenerator::new(
            GeneratorConfig::default(),
            Arc::new(FlakyEntropy {
                remaining: AtomicUsize::new(1),
            }),
        );
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "a,b,c")], &[]);
        let err = generator.generate_data(&mut s).unwrap_err();

        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(30)));
        assert!(field(&s, "a").is_some());
        assert!(field(&s, "b").is_none());
        assert_eq!(annotation(&s, ANNOTATION_SECURE), None);
    }

    #[test]
    fn test_missing_autogenerate_annotation_is_noop() {
        let mut s = secret(&[], &[]);
        let before = s.clone();
        let report = generator().generate_data(&mut s).unwrap();
        assert_eq!(report.count(), 0);
        assert_eq!(s.data, before.data);
    }

    #[test]
    fn test_creates_missing_data_map() {
        let mut s = secret(&[(ANNOTATION_AUTOGENERATE, "a")], &[]);
        s.data = None;
        generator().generate_data(&mut s).unwrap();
        assert!(field(&s, "a").is_some());
    }
}
