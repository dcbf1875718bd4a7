//! # Regenerate Command
//!
//! Sets the regenerate annotation on a Secret. The controller consumes the
//! annotation on its next pass and replaces the requested fields.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use secret_generator_controller::controller::generator::annotations::{
    ANNOTATION_REGENERATE, ANNOTATION_VALUE_YES,
};
use serde_json::{json, Value};

/// Request regeneration of `fields` (every field when empty)
pub async fn regenerate_command(
    client: Client,
    name: String,
    namespace: Option<String>,
    fields: Vec<String>,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<Secret> = Api::namespaced(client, ns);

    let value = regenerate_value(&fields);
    println!("Requesting regeneration for Secret '{ns}/{name}'...");

    api.patch(
        &name,
        &PatchParams::default(),
        &Patch::Merge(regenerate_patch(&value)),
    )
    .await
    .with_context(|| format!("Failed to annotate Secret '{ns}/{name}'"))?;

    println!("Regeneration requested");
    println!("   Resource: {ns}/{name}");
    println!("   Annotation: {ANNOTATION_REGENERATE}={value}");
    println!("\nThe controller will regenerate the requested fields shortly.");

    Ok(())
}

fn regenerate_value(fields: &[String]) -> String {
    let fields: Vec<&str> = fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        ANNOTATION_VALUE_YES.to_string()
    } else {
        fields.join(",")
    }
}

fn regenerate_patch(value: &str) -> Value {
    json!({
        "metadata": {
            "annotations": {
                ANNOTATION_REGENERATE: value
            }
        }
    })
}
