//! # Basic-Auth Generator
//!
//! Writes a username, a random password and the matching htpasswd line
//! (`username:<bcrypt hash>`) into `username`, `password` and `auth`.

use crate::config::GeneratorConfig;
use crate::constants::MAX_SECRET_LENGTH;
use crate::controller::generator::annotations::{
    username_from_annotation, ANNOTATION_SECURE, ANNOTATION_VALUE_YES,
    DEFAULT_BASIC_AUTH_USERNAME,
};
use crate::controller::generator::{
    generate_random_string_with, EntropySource, GenerationDirective, GenerationReport, Generator,
    GeneratorError,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

pub const FIELD_USERNAME: &str = "username";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_AUTH: &str = "auth";

#[derive(Debug, Clone)]
pub struct BasicAuthGenerator {
    config: GeneratorConfig,
    entropy: Arc<dyn EntropySource>,
}

impl BasicAuthGenerator {
    #[must_use]
    pub fn new(config: GeneratorConfig, entropy: Arc<dyn EntropySource>) -> Self {
        Self { config, entropy }
    }
}

impl Generator for BasicAuthGenerator {
    fn generate_data(&self, secret: &mut Secret) -> Result<GenerationReport, GeneratorError> {
        let annotations = secret
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new);

        let directive = GenerationDirective::resolve(
            annotations,
            vec![
                FIELD_USERNAME.to_string(),
                FIELD_PASSWORD.to_string(),
                FIELD_AUTH.to_string(),
            ],
            self.config.secret_length,
            MAX_SECRET_LENGTH,
            &self.config,
        )?;
        let username = username_from_annotation(DEFAULT_BASIC_AUTH_USERNAME, annotations);

        let data = secret.data.get_or_insert_with(BTreeMap::new);
        let has_auth = data
            .get(FIELD_AUTH)
            .is_some_and(|value| !value.0.is_empty());

        if has_auth && !directive.regeneration.is_requested() {
            debug!("basic-auth credentials already present");
            return Ok(GenerationReport::default());
        }

        let password = Zeroizing::new(
            generate_random_string_with(
                self.entropy.as_ref(),
                directive.length,
                directive.encoding,
                directive.is_byte_length,
            )
            .inspect_err(|e| error!(error = %e, "could not generate basic-auth password"))?,
        );
        let hash = bcrypt::hash(password.as_slice(), self.config.bcrypt_cost)
            .inspect_err(|e| error!(error = %e, "could not hash basic-auth password"))?;

        data.insert(
            FIELD_USERNAME.to_string(),
            ByteString(username.as_bytes().to_vec()),
        );
        data.insert(FIELD_PASSWORD.to_string(), ByteString(password.to_vec()));
        data.insert(
            FIELD_AUTH.to_string(),
            ByteString(format!("{username}:{hash}").into_bytes()),
        );
        annotations.insert(
            ANNOTATION_SECURE.to_string(),
            ANNOTATION_VALUE_YES.to_string(),
        );

        info!(username = username.as_str(), "generated basic-auth credentials");

        Ok(GenerationReport {
            generated: directive.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::generator::annotations::{
        ANNOTATION_BASIC_AUTH_USERNAME, ANNOTATION_LENGTH, ANNOTATION_REGENERATE,
    };
    use crate::controller::generator::OsEntropy;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn generator() -> BasicAuthGenerator {
        let config = GeneratorConfig {
            bcrypt_cost: 4,
            ..GeneratorConfig::default()
        };
        BasicAuthGenerator::new(config, Arc::new(OsEntropy))
    }

    fn secret(annotations: &[(&str, &str)], data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
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

    fn field(secret: &Secret, name: &str) -> String {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(name))
            .map(|v| String::from_utf8(v.0.clone()).unwrap())
            .unwrap_or_default()
    }

    #[test]
    fn test_generates_verifiable_credentials() {
        let mut s = secret(&[], &[]);
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.generated, vec!["username", "password", "auth"]);
        assert_eq!(field(&s, FIELD_USERNAME), "admin");

        let password = field(&s, FIELD_PASSWORD);
        assert_eq!(password.len(), 40);

        let auth = field(&s, FIELD_AUTH);
        let (user, hash) = auth.split_once(':').unwrap();
        assert_eq!(user, "admin");
        assert!(bcrypt::verify(&password, hash).unwrap());
        assert_eq!(
            s.metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(ANNOTATION_SECURE))
                .map(String::as_str),
            Some("yes")
        );
    }

    #[test]
    fn test_username_and_length_annotations() {
        let mut s = secret(
            &[
                (ANNOTATION_BASIC_AUTH_USERNAME, "operator"),
                (ANNOTATION_LENGTH, "12"),
            ],
            &[],
        );
        generator().generate_data(&mut s).unwrap();

        assert_eq!(field(&s, FIELD_USERNAME), "operator");
        assert_eq!(field(&s, FIELD_PASSWORD).len(), 12);
        assert!(field(&s, FIELD_AUTH).starts_with("operator:$2"));
    }

    #[test]
    fn test_existing_credentials_are_kept() {
        let mut s = secret(
            &[(ANNOTATION_SECURE, "yes")],
            &[
                ("username", "admin"),
                ("password", "hunter2"),
                ("auth", "admin:$2b$04$existing"),
            ],
        );
        let before = s.clone();
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.count(), 0);
        assert_eq!(s, before);
    }

    #[test]
    fn test_regenerate_rotates_password() {
        let mut s = secret(
            &[(ANNOTATION_SECURE, "yes"), (ANNOTATION_REGENERATE, "yes")],
            &[
                ("username", "admin"),
                ("password", "hunter2"),
                ("auth", "admin:$2b$04$existing"),
            ],
        );
        let report = generator().generate_data(&mut s).unwrap();

        assert_eq!(report.count(), 3);
        assert_ne!(field(&s, FIELD_PASSWORD), "hunter2");
        let auth = field(&s, FIELD_AUTH);
        let (_, hash) = auth.split_once(':').unwrap();
        assert!(bcrypt::verify(field(&s, FIELD_PASSWORD), hash).unwrap());
    }
}
