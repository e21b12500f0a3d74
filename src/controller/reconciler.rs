//! UnifiedVolumeReplication Reconciler
//!
//! Watches `UnifiedVolumeReplication` resources, decides which operation a
//! change calls for, runs it through the controller engine and writes the
//! result back to the status subresource.

use super::engine::{ControllerEngine, ReplicationOutcome};
use crate::crd::{
    ConditionStatus, ReplicationCondition, UnifiedVolumeReplication,
    UnifiedVolumeReplicationStatus,
};
use crate::domain::ports::Operation;
use crate::error::{Error, ErrorAction, Result};
use chrono::Utc;
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::finalizer::{self, finalizer, Event as FinalizerEvent};
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Finalizer guarding backend cleanup
pub const FINALIZER: &str = "replication.unified.io/cleanup";

/// Requeue interval for healthy intents; drives periodic status sync
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

const READY_CONDITION: &str = "Ready";

/// Shared state handed to every reconciliation
pub struct Context {
    pub client: Client,
    pub engine: Arc<ControllerEngine>,
    pub cancel: CancellationToken,
}

// =============================================================================
// Operation Choice and Status
// =============================================================================

/// Operation a live (not deleting) intent calls for
pub fn choose_operation(uvr: &UnifiedVolumeReplication) -> Operation {
    if uvr.metadata.deletion_timestamp.is_some() {
        return Operation::Delete;
    }
    let observed = uvr.status.as_ref().and_then(|s| s.observed_generation);
    match observed {
        None => Operation::Create,
        Some(_) if uvr.generation_changed() => Operation::Update,
        Some(_) => Operation::Sync,
    }
}

/// Status after running an operation
///
/// The observed generation only advances on success, so a failed create is
/// retried as a create.
pub fn next_status(
    uvr: &UnifiedVolumeReplication,
    operation: Operation,
    result: &Result<ReplicationOutcome>,
) -> UnifiedVolumeReplicationStatus {
    let mut status = uvr.status.clone().unwrap_or_default();
    let now = Utc::now();
    status.last_reconcile_time = Some(now);

    let condition = match result {
        Ok(outcome) => {
            status.backend = Some(outcome.backend);
            status.observed_generation = uvr.metadata.generation;
            match &outcome.status {
                Some(observed) => {
                    status.state = Some(observed.state.clone());
                    status.mode = Some(observed.mode.clone());
                    status.message = Some(observed.message.clone());
                    if observed.last_sync_time.is_some() {
                        status.last_sync_time = observed.last_sync_time;
                    }
                }
                None => {
                    status.message = Some(format!("{} applied on {}", operation, outcome.backend));
                }
            }
            ReplicationCondition {
                r#type: READY_CONDITION.to_string(),
                status: ConditionStatus::True,
                last_transition_time: Some(now),
                reason: Some("Reconciled".to_string()),
                message: None,
            }
        }
        Err(e) => {
            status.message = Some(e.to_string());
            let reason = match e.stage() {
                Some(stage) => format!("{}Failed", camel(&stage.to_string())),
                None => "ReconcileFailed".to_string(),
            };
            ReplicationCondition {
                r#type: READY_CONDITION.to_string(),
                status: ConditionStatus::False,
                last_transition_time: Some(now),
                reason: Some(reason),
                message: Some(e.to_string()),
            }
        }
    };

    // keep the transition time when the condition did not flip
    let previous = status
        .conditions
        .iter()
        .find(|c| c.r#type == READY_CONDITION)
        .map(|c| (c.status, c.last_transition_time));
    let condition = match previous {
        Some((prev_status, prev_time)) if prev_status == condition.status => ReplicationCondition {
            last_transition_time: prev_time,
            ..condition
        },
        _ => condition,
    };
    status.set_condition(condition);
    status
}

/// "adapter-init" -> "AdapterInit"
fn camel(kebab: &str) -> String {
    kebab
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Requeue policy for a failed reconciliation
pub fn requeue_action(err: &Error) -> Action {
    match err.action() {
        ErrorAction::RequeueWithBackoff => Action::requeue(Duration::from_secs(15)),
        ErrorAction::RequeueAfter(after) => Action::requeue(after),
        ErrorAction::NoRequeue => Action::await_change(),
    }
}

// =============================================================================
// Reconcile Loop
// =============================================================================

async fn reconcile(uvr: Arc<UnifiedVolumeReplication>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = uvr.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<UnifiedVolumeReplication> = Api::namespaced(ctx.client.clone(), &namespace);
    let span = info_span!("reconcile", name = %uvr.name_any(), namespace = %namespace);

    let (api_ref, ctx_ref) = (&api, &ctx);
    let result = finalizer(&api, FINALIZER, uvr, |event| async move {
        match event {
            FinalizerEvent::Apply(uvr) => apply(uvr, api_ref, ctx_ref).await,
            FinalizerEvent::Cleanup(uvr) => cleanup(uvr, ctx_ref).await,
        }
    })
    .instrument(span)
    .await;

    result.map_err(|e| match e {
        finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e,
        finalizer::Error::AddFinalizer(e) | finalizer::Error::RemoveFinalizer(e) => Error::Kube(e),
        other => Error::Internal(other.to_string()),
    })
}

async fn apply(
    uvr: Arc<UnifiedVolumeReplication>,
    api: &Api<UnifiedVolumeReplication>,
    ctx: &Context,
) -> Result<Action> {
    let operation = choose_operation(&uvr);
    debug!("Reconciling {} with {}", uvr.name(), operation);

    let result = ctx
        .engine
        .process_replication(&ctx.cancel, &uvr, operation)
        .await;

    let status = next_status(&uvr, operation, &result);
    let patch = json!({ "status": status });
    api.patch_status(uvr.name(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    match result {
        Ok(_) => Ok(Action::requeue(RESYNC_INTERVAL)),
        Err(e) => Err(e),
    }
}

async fn cleanup(uvr: Arc<UnifiedVolumeReplication>, ctx: &Context) -> Result<Action> {
    info!("Cleaning up replication {}", uvr.name());
    ctx.engine
        .process_replication(&ctx.cancel, &uvr, Operation::Delete)
        .await?;
    Ok(Action::await_change())
}

fn error_policy(uvr: Arc<UnifiedVolumeReplication>, err: &Error, _ctx: Arc<Context>) -> Action {
    warn!("Reconcile of {} failed: {}", uvr.name(), err);
    requeue_action(err)
}

/// Run the controller until shutdown is signalled
pub async fn run(ctx: Arc<Context>, namespace: Option<String>) -> Result<()> {
    let api: Api<UnifiedVolumeReplication> = match &namespace {
        Some(ns) => Api::namespaced(ctx.client.clone(), ns),
        None => Api::all(ctx.client.clone()),
    };

    // fail fast when the CRD is not installed
    api.list(&kube::api::ListParams::default().limit(1))
        .await
        .map_err(|e| Error::Configuration(format!("UnifiedVolumeReplication CRD unavailable: {}", e)))?;

    let concurrency = ctx.engine.config().concurrency_limit()?;
    info!(
        "Starting replication controller (namespace: {}, concurrency: {})",
        namespace.as_deref().unwrap_or("all"),
        concurrency
    );

    let cancel = ctx.cancel.clone();
    Controller::new(api, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency))
        .graceful_shutdown_on(async move { cancel.cancelled().await })
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {}", obj.name),
                Err(e) => error!("Reconcile error: {}", e),
            }
        })
        .await;

    info!("Replication controller stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterConfig, AdapterRegistry};
    use crate::controller::selector::SelectionError;
    use crate::controller::ControllerConfig;
    use crate::crd::{CephExtensions, Extensions, ReplicationState, UnifiedVolumeReplicationSpec};
    use crate::discovery::StaticDiscoverer;
    use crate::domain::ports::{Backend, BackendStatus, ReplicationStatus};
    use crate::error::PipelineStage;
    use crate::translation::TranslationEngine;
    use assert_matches::assert_matches;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn uvr(generation: i64, observed: Option<i64>) -> UnifiedVolumeReplication {
        let mut uvr = UnifiedVolumeReplication::new("db", UnifiedVolumeReplicationSpec::default());
        uvr.metadata.generation = Some(generation);
        if observed.is_some() {
            uvr.status = Some(UnifiedVolumeReplicationStatus {
                observed_generation: observed,
                ..Default::default()
            });
        }
        uvr
    }

    #[test]
    fn test_choose_operation() {
        assert_eq!(choose_operation(&uvr(1, None)), Operation::Create);
        assert_eq!(choose_operation(&uvr(2, Some(1))), Operation::Update);
        assert_eq!(choose_operation(&uvr(2, Some(2))), Operation::Sync);

        let mut deleting = uvr(2, Some(2));
        deleting.metadata.deletion_timestamp = Some(Time(Utc::now()));
        assert_eq!(choose_operation(&deleting), Operation::Delete);
    }

    /// Run one reconcile pass against the engine and record the status
    async fn pass(
        engine: &ControllerEngine,
        uvr: &mut UnifiedVolumeReplication,
    ) -> (Operation, Result<ReplicationOutcome>) {
        let operation = choose_operation(uvr);
        let result = engine
            .process_replication(&CancellationToken::new(), uvr, operation)
            .await;
        uvr.status = Some(next_status(uvr, operation, &result));
        (operation, result)
    }

    #[tokio::test]
    async fn test_backend_stays_bound_after_new_install() {
        // ceph is listed first but not installed yet
        let discoverer = Arc::new(StaticDiscoverer::ready(&[Backend::Ceph, Backend::Trident]));
        discoverer.set_status(Backend::Ceph, BackendStatus::NotFound);

        let translator = Arc::new(TranslationEngine::new().unwrap());
        let registry = AdapterRegistry::with_defaults(translator.clone(), &AdapterConfig::default(), None);
        let engine = ControllerEngine::new(
            ControllerConfig::default(),
            discoverer.clone(),
            translator,
            Arc::new(registry),
        )
        .unwrap();

        let mut intent = uvr(1, None);
        intent.metadata.namespace = Some("apps".into());
        intent.spec.source_endpoint.storage_class = "standard".into();
        intent.spec.replication_state = ReplicationState::Source;

        let (operation, result) = pass(&engine, &mut intent).await;
        assert_eq!(operation, Operation::Create);
        assert_eq!(result.unwrap().backend, Backend::Trident);
        assert_eq!(intent.bound_backend(), Some(Backend::Trident));

        discoverer.set_status(Backend::Ceph, BackendStatus::Ready);
        engine.invalidate_cache();

        let (operation, result) = pass(&engine, &mut intent).await;
        assert_eq!(operation, Operation::Sync);
        let outcome = result.unwrap();
        assert_eq!(outcome.backend, Backend::Trident);
        assert_eq!(outcome.status.unwrap().state, "source");

        intent.metadata.generation = Some(2);
        intent.spec.replication_state = ReplicationState::Replica;
        let (operation, result) = pass(&engine, &mut intent).await;
        assert_eq!(operation, Operation::Update);
        assert_eq!(result.unwrap().backend, Backend::Trident);

        intent.metadata.deletion_timestamp = Some(Time(Utc::now()));
        let (operation, result) = pass(&engine, &mut intent).await;
        assert_eq!(operation, Operation::Delete);
        assert_eq!(result.unwrap().backend, Backend::Trident);

        // the trident object is gone and nothing was ever written to ceph
        let token = CancellationToken::new();
        let err = engine.get_replication_status(&token, &intent).await.unwrap_err();
        assert_matches!(err.root_cause(), Error::ResourceNotFound { kind, .. } if kind == "TridentMirrorRelationship");

        let mut on_ceph = intent.clone();
        on_ceph.status = None;
        on_ceph.spec.extensions = Some(Extensions {
            ceph: Some(CephExtensions::default()),
            ..Default::default()
        });
        let err = engine.get_replication_status(&token, &on_ceph).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Execution));
        assert_matches!(err.root_cause(), Error::ResourceNotFound { kind, .. } if kind == "VolumeReplication");
    }

    #[tokio::test]
    async fn test_bound_backend_uninstalled_blocks_cleanup() {
        let discoverer = Arc::new(StaticDiscoverer::ready(&[Backend::Ceph]));
        let translator = Arc::new(TranslationEngine::new().unwrap());
        let registry = AdapterRegistry::with_defaults(translator.clone(), &AdapterConfig::default(), None);
        let engine = ControllerEngine::new(
            ControllerConfig::default(),
            discoverer,
            translator,
            Arc::new(registry),
        )
        .unwrap();

        let mut intent = uvr(2, Some(2));
        intent.metadata.deletion_timestamp = Some(Time(Utc::now()));
        if let Some(status) = intent.status.as_mut() {
            status.backend = Some(Backend::PowerStore);
        }

        let (operation, result) = pass(&engine, &mut intent).await;
        assert_eq!(operation, Operation::Delete);
        let err = result.unwrap_err();
        assert_matches!(
            err,
            Error::Selection(SelectionError::BackendNotAvailable { backend: Backend::PowerStore })
        );
        assert_eq!(requeue_action(&err), Action::requeue(Duration::from_secs(60)));
    }

    #[test]
    fn test_next_status_on_sync() {
        let uvr = uvr(3, Some(3));
        let outcome = ReplicationOutcome {
            backend: Backend::Trident,
            status: Some(ReplicationStatus {
                state: "replica".into(),
                mode: "synchronous".into(),
                message: "mirrored".into(),
                last_sync_time: None,
            }),
        };

        let status = next_status(&uvr, Operation::Sync, &Ok(outcome));
        assert_eq!(status.state.as_deref(), Some("replica"));
        assert_eq!(status.backend, Some(Backend::Trident));
        assert_eq!(status.observed_generation, Some(3));
        assert!(status.is_ready());
    }

    #[test]
    fn test_next_status_on_failure_keeps_generation() {
        let uvr = uvr(1, None);
        let err = Error::Selection(SelectionError::NoBackendsAvailable);

        let status = next_status(&uvr, Operation::Create, &Err(err));
        assert_eq!(status.observed_generation, None);
        assert!(!status.is_ready());
        assert_eq!(status.conditions[0].reason.as_deref(), Some("SelectionFailed"));
        assert_eq!(choose_operation(&UnifiedVolumeReplication {
            status: Some(status),
            ..uvr
        }), Operation::Create);
    }

    #[test]
    fn test_transition_time_kept_while_ready() {
        let mut uvr = uvr(1, None);
        let ok = || {
            Ok(ReplicationOutcome {
                backend: Backend::Ceph,
                status: None,
            })
        };

        let first = next_status(&uvr, Operation::Create, &ok());
        let since = first.conditions[0].last_transition_time;
        uvr.status = Some(first);

        let second = next_status(&uvr, Operation::Sync, &ok());
        assert_eq!(second.conditions[0].last_transition_time, since);
        assert_eq!(second.message.as_deref(), Some("sync applied on ceph"));
    }

    #[test]
    fn test_camel() {
        assert_eq!(camel("adapter-init"), "AdapterInit");
        assert_eq!(camel("selection"), "Selection");
    }

    #[test]
    fn test_requeue_action() {
        let err = Error::Configuration("bad".into());
        assert_eq!(requeue_action(&err), Action::await_change());

        let err = Error::Selection(SelectionError::NoBackendsAvailable);
        assert_eq!(requeue_action(&err), Action::requeue(Duration::from_secs(60)));
    }
}
