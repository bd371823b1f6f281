//! Generic fail/recover engine.
//!
//! Every service implements [`FaultStrategy`] with its own typed snapshot
//! state; the engine owns the invariants that are identical across services:
//! request validation, state-path pre-flight and locking, single-flush
//! persistence, the dry-run rollback refusal, and state-file deletion after
//! a successful rollback.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AzError, AzResult};
use crate::request::FailureRequest;
use crate::service::Service;
use crate::statefile;

/// The persisted unit of a fail/recover pair: AZ, dry-run provenance, and
/// one service-specific collection of Before/After snapshot records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument<S> {
    #[serde(rename = "AvailabilityZone")]
    pub availability_zone: String,
    #[serde(rename = "DryRun")]
    pub dry_run: bool,
    #[serde(flatten)]
    pub state: S,
}

/// One service's discover → plan → mutate → snapshot logic and its inverse.
#[async_trait]
pub trait FaultStrategy: Send + Sync {
    /// Typed snapshot collection, e.g. `{"AutoScalingGroups": [...]}`.
    type State: Serialize + DeserializeOwned + Send + Sync;

    fn service(&self) -> Service;

    /// Discover the target set, mutate it (unless `request.dry_run`), and
    /// return the Before/After records. An empty target set must be a
    /// `Discovery` error, never a silent no-op.
    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State>;

    /// Replay the inverse mutation from a previously captured document.
    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()>;
}

/// Simulate the loss of an AZ and persist the rollback snapshot.
pub async fn fail_az<F: FaultStrategy>(
    strategy: &F,
    request: &FailureRequest,
) -> AzResult<StateDocument<F::State>> {
    let service = strategy.service();
    request.validate(service)?;

    // Take the lock before looking at the state file; checking first would
    // let two invocations both pass the existence check.
    let path = statefile::normalize_path(&request.state_path, service)?;
    let _lock = statefile::Lock::acquire(&path, service)?;
    statefile::validate_for_write(&path, service)?;

    tracing::warn!(
        service = %service,
        az = %request.az,
        dry_run = request.dry_run,
        "Executing fail_az action"
    );

    let state = strategy.apply(request).await?;
    let document = StateDocument {
        availability_zone: request.az.clone(),
        dry_run: request.dry_run,
        state,
    };

    statefile::write(&document, &path, service)?;
    Ok(document)
}

/// Roll the simulated failure back from the snapshot and delete it.
pub async fn recover_az<F: FaultStrategy>(strategy: &F, state_path: &Path) -> AzResult<bool> {
    let service = strategy.service();
    let path = statefile::normalize_path(state_path, service)?;
    let _lock = statefile::Lock::acquire(&path, service)?;
    statefile::validate_for_read(&path, service)?;

    let document: StateDocument<F::State> = statefile::read(&path, service)?;
    if document.dry_run {
        return Err(AzError::state_file(
            service,
            "state file was generated from a dry run, nothing was mutated",
        ));
    }

    tracing::warn!(
        service = %service,
        az = %document.availability_zone,
        "Executing recover_az from state file"
    );

    strategy.revert(&document).await?;
    statefile::remove_best_effort(&path, service);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopFault;

    #[async_trait]
    impl FaultStrategy for NoopFault {
        type State = serde_json::Value;

        fn service(&self) -> Service {
            Service::Rds
        }

        async fn apply(&self, _request: &FailureRequest) -> AzResult<Self::State> {
            Ok(serde_json::json!({}))
        }

        async fn revert(&self, _document: &StateDocument<Self::State>) -> AzResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn held_lock_blocks_fail_az_before_the_state_file_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail_az.rds.json");
        // A leftover real-run document would normally be the error; with the
        // lock held the contention must win, proving the existence check
        // happens under the lock.
        std::fs::write(
            &path,
            r#"{"AvailabilityZone": "ap-southeast-1a", "DryRun": false}"#,
        )
        .unwrap();
        let held = statefile::Lock::acquire(&path, Service::Rds).unwrap();

        let request = FailureRequest::new("ap-southeast-1a", false).with_state_path(&path);
        let err = fail_az(&NoopFault, &request).await.unwrap_err();
        assert!(err.to_string().contains("another fail_az"));

        drop(held);
        let err = fail_az(&NoopFault, &request).await.unwrap_err();
        assert!(err.to_string().contains("existing state file"));
    }

    #[tokio::test]
    async fn held_lock_blocks_recover_az() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail_az.rds.json");
        std::fs::write(
            &path,
            r#"{"AvailabilityZone": "ap-southeast-1a", "DryRun": false}"#,
        )
        .unwrap();
        let _held = statefile::Lock::acquire(&path, Service::Rds).unwrap();

        let err = recover_az(&NoopFault, &path).await.unwrap_err();
        assert!(err.to_string().contains("another fail_az"));
        assert!(path.is_file());
    }
}
