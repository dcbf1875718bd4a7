//! # Status Command
//!
//! Shows the generation directives of a Secret and the size of each field.
//! Field values are never printed.

use crate::OutputFormat;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use secret_generator_controller::controller::generator::annotations::{
    ANNOTATION_AUTOGENERATE, ANNOTATION_BASIC_AUTH_USERNAME, ANNOTATION_ENCODING,
    ANNOTATION_GENERATED_AT, ANNOTATION_LENGTH, ANNOTATION_REGENERATE, ANNOTATION_SECRET_TYPE,
    ANNOTATION_SECURE, ANNOTATION_TEMPLATE,
};
use serde::Serialize;
use std::collections::BTreeMap;

const DIRECTIVE_ANNOTATIONS: [&str; 9] = [
    ANNOTATION_SECRET_TYPE,
    ANNOTATION_AUTOGENERATE,
    ANNOTATION_LENGTH,
    ANNOTATION_ENCODING,
    ANNOTATION_TEMPLATE,
    ANNOTATION_BASIC_AUTH_USERNAME,
    ANNOTATION_REGENERATE,
    ANNOTATION_SECURE,
    ANNOTATION_GENERATED_AT,
];

/// Redacted view of a Secret
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretStatus {
    name: String,
    namespace: String,
    directives: BTreeMap<String, String>,
    /// Field name to value size in bytes
    field_sizes: BTreeMap<String, usize>,
}

impl SecretStatus {
    fn from_secret(secret: &Secret) -> Self {
        let directives = secret
            .metadata
            .annotations
            .iter()
            .flatten()
            .filter(|(k, _)| DIRECTIVE_ANNOTATIONS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let field_sizes = secret
            .data
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.0.len()))
            .collect();

        Self {
            name: secret.metadata.name.clone().unwrap_or_default(),
            namespace: secret.metadata.namespace.clone().unwrap_or_default(),
            directives,
            field_sizes,
        }
    }
}

/// Show the directives and field sizes of a Secret
pub async fn status_command(
    client: Client,
    name: String,
    namespace: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<Secret> = Api::namespaced(client, ns);

    let secret = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get Secret '{ns}/{name}'"))?;
    let status = SecretStatus::from_secret(&secret);

    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&status).context("Failed to encode status")?
            );
        }
        OutputFormat::Text => print_text(&status),
    }

    Ok(())
}

fn print_text(status: &SecretStatus) {
    println!("Status for Secret '{}/{}'", status.namespace, status.name);
    println!();
    println!("Directives:");
    if status.directives.is_empty() {
        println!("  (none)");
    }
    for (key, value) in &status.directives {
        println!("  {key}: {value}");
    }

    println!();
    println!("Fields:");
    if status.field_sizes.is_empty() {
        println!("  (none)");
    }
    for (field, size) in &status.field_sizes {
        println!("  {field}: {size} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;

    #[test]
    fn test_status_hides_values_and_foreign_annotations() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("db".to_string()),
                namespace: Some("apps".to_string()),
                annotations: Some(BTreeMap::from([
                    (ANNOTATION_AUTOGENERATE.to_string(), "password".to_string()),
                    ("team".to_string(), "payments".to_string()),
                ])),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "password".to_string(),
                ByteString(b"hunter22".to_vec()),
            )])),
            ..Secret::default()
        };

        let status = SecretStatus::from_secret(&secret);
        assert_eq!(status.directives.len(), 1);
        assert_eq!(status.field_sizes.get("password"), Some(&8));

        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("hunter22"));
        assert!(json.contains("fieldSizes"));
    }
}
