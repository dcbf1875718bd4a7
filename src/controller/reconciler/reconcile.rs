//! # Reconcile
//!
//! One reconciliation pass over a Secret:
//!
//! 1. Fetch the current Secret. A missing Secret ends the pass without error.
//! 2. Resolve the secret type. A Secret with an autogenerate annotation but no
//!    valid type is treated as `string` and gets the type annotation added.
//!    Anything else without a valid type is left alone.
//! 3. Run the generator on a copy of the Secret.
//! 4. Compare annotations and data of the copy with the fetched Secret.
//! 5. When they differ, stamp the generated-at annotation and replace the
//!    stored Secret.

use crate::controller::generator::annotations::{
    Annotations, ANNOTATION_AUTOGENERATE, ANNOTATION_GENERATED_AT, ANNOTATION_SECRET_TYPE,
};
use crate::controller::generator::{generator_for, SecretType};
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::observability;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Entry point for `kube_runtime::Controller`.
///
/// Secrets are re-fetched by name so the pass always starts from the latest
/// stored version rather than the cached watch event.
pub async fn reconcile(obj: Arc<Secret>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = obj.metadata.name.as_deref().unwrap_or_default();
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");
    let resource_key = format!("{namespace}/{name}");

    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.reconcile",
        resource.name = name,
        resource.namespace = namespace,
    );

    async {
        observability::increment_reconciliations();
        let start = Instant::now();

        let result = reconcile_secret(&ctx, namespace, name).await;
        observability::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.clear_backoff(&resource_key);
        debug!(outcome = outcome.as_str(), "reconciliation finished");

        // Nothing is scheduled: the next pass comes from the next change to the Secret
        Ok(Action::await_change())
    }
    .instrument(span)
    .await
}

/// True when the Secret carries a type or autogenerate annotation
#[must_use]
pub fn is_candidate(secret: &Secret) -> bool {
    secret.metadata.annotations.as_ref().is_some_and(|a| {
        a.contains_key(ANNOTATION_SECRET_TYPE) || a.contains_key(ANNOTATION_AUTOGENERATE)
    })
}

/// Run one reconciliation pass for `namespace/name`
pub async fn reconcile_secret(
    reconciler: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let key = format!("{namespace}/{name}");

    let Some(current) = reconciler
        .store
        .get(namespace, name)
        .await
        .map_err(|source| ReconcilerError::Fetch {
            key: key.clone(),
            source,
        })?
    else {
        debug!("secret not found, it may have been deleted");
        return Ok(ReconcileOutcome::NotFound);
    };

    let mut desired = current.clone();
    let annotations = desired
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new);

    let Some(secret_type) = resolve_secret_type(annotations) else {
        debug!("secret has no valid type annotation and no autogenerate annotation, ignoring");
        return Ok(ReconcileOutcome::Unmanaged);
    };

    let generator = generator_for(
        secret_type,
        &reconciler.config.generator,
        Arc::clone(&reconciler.entropy),
    );

    // Key generation and bcrypt are CPU bound
    let (desired, generated) = tokio::task::spawn_blocking(move || {
        let result = generator.generate_data(&mut desired);
        (desired, result)
    })
    .await
    .map_err(|source| ReconcilerError::Task {
        key: key.clone(),
        source,
    })?;

    let report = generated.map_err(|source| {
        warn!(secret_type = secret_type.as_str(), error = %source, "secret generation failed");
        ReconcilerError::Generation {
            key: key.clone(),
            source,
        }
    })?;

    if !has_changes(&current, &desired) {
        debug!(secret_type = secret_type.as_str(), "secret is up to date");
        return Ok(ReconcileOutcome::Unchanged);
    }

    let mut desired = desired;
    stamp_generated_at(&mut desired);

    reconciler
        .store
        .update(&desired)
        .await
        .map_err(|source| ReconcilerError::Persist {
            key: key.clone(),
            source,
        })?;

    observability::increment_secrets_updated();
    observability::increment_fields_generated(secret_type.as_str(), report.count());
    info!(
        secret_type = secret_type.as_str(),
        fields = ?report.generated,
        "updated secret with generated values"
    );

    Ok(ReconcileOutcome::Updated)
}

/// Resolve the secret type, adding the `string` type annotation for Secrets
/// that only declare an autogenerate list
fn resolve_secret_type(annotations: &mut Annotations) -> Option<SecretType> {
    let declared = annotations
        .get(ANNOTATION_SECRET_TYPE)
        .map(|value| value.parse::<SecretType>());

    match declared {
        Some(Ok(secret_type)) => Some(secret_type),
        _ if annotations.contains_key(ANNOTATION_AUTOGENERATE) => {
            if let Some(Err(e)) = &declared {
                warn!(error = %e, "ignoring type annotation, defaulting to string");
            }
            annotations.insert(
                ANNOTATION_SECRET_TYPE.to_string(),
                SecretType::String.as_str().to_string(),
            );
            Some(SecretType::String)
        }
        _ => None,
    }
}

/// Annotations or data differ. Missing maps compare equal to empty ones.
fn has_changes(current: &Secret, desired: &Secret) -> bool {
    let empty_annotations = BTreeMap::new();
    let empty_data: BTreeMap<String, ByteString> = BTreeMap::new();

    let annotations_changed = current
        .metadata
        .annotations
        .as_ref()
        .unwrap_or(&empty_annotations)
        != desired
            .metadata
            .annotations
            .as_ref()
            .unwrap_or(&empty_annotations);
    let data_changed = current.data.as_ref().unwrap_or(&empty_data)
        != desired.data.as_ref().unwrap_or(&empty_data);

    annotations_changed || data_changed
}

fn stamp_generated_at(secret: &mut Secret) {
    secret
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(
            ANNOTATION_GENERATED_AT.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
}
