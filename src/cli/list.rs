//! # List Command
//!
//! Lists Secrets that carry generator annotations.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams},
    Client,
};
use secret_generator_controller::controller::generator::annotations::{
    ANNOTATION_GENERATED_AT, ANNOTATION_SECRET_TYPE,
};
use secret_generator_controller::controller::reconciler::is_candidate;

/// List managed Secrets with their type and last generation time
pub async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<Secret> = if let Some(ns) = &namespace {
        println!("Listing managed Secrets in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing managed Secrets in all namespaces...");
        Api::all(client)
    };

    let secrets = api
        .list(&ListParams::default())
        .await
        .context("Failed to list Secrets")?;

    let managed: Vec<&Secret> = secrets.items.iter().filter(|s| is_candidate(s)).collect();
    if managed.is_empty() {
        println!("No managed Secrets found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<14} {:<22}",
        "NAME", "NAMESPACE", "TYPE", "GENERATED AT"
    );
    println!("{}", "-".repeat(86));

    for secret in managed {
        let name = secret.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = secret.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let secret_type = annotation(secret, ANNOTATION_SECRET_TYPE).unwrap_or("string");
        let generated_at = annotation(secret, ANNOTATION_GENERATED_AT).unwrap_or("-");

        println!("{name:<30} {ns:<20} {secret_type:<14} {generated_at:<22}");
    }

    Ok(())
}

fn annotation<'a>(secret: &'a Secret, key: &str) -> Option<&'a str> {
    secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}
