//! RDS AZ failure.
//!
//! Multi-AZ DB instances whose primary sits in the target AZ get a forced
//! failover reboot; multi-AZ clusters whose writer sits there get a cluster
//! failover. Both are AWS-managed transitions with no inverse, so recovery
//! only validates and discards the state file.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, join_bounded, AzError, AzResult, FailureRequest, FaultStrategy, Service,
    StateDocument, DEFAULT_CONCURRENCY,
};

use crate::api::{tags_match, RdsApi};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RdsState {
    #[serde(rename = "DBInstances")]
    pub db_instances: RdsOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RdsOutcome {
    #[serde(rename = "Success")]
    pub success: RdsIdLists,
    #[serde(rename = "Failed")]
    pub failed: RdsIdLists,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RdsIdLists {
    #[serde(rename = "DBInstanceIdentifiers")]
    pub db_instance_identifiers: Vec<String>,
    #[serde(rename = "DBClusterIdentifiers")]
    pub db_cluster_identifiers: Vec<String>,
}

struct RdsFault<'a, R> {
    rds: &'a R,
}

impl<R: RdsApi> RdsFault<'_, R> {
    /// Multi-AZ instances in the target AZ carrying the requested tags.
    async fn target_instances(&self, request: &FailureRequest) -> AzResult<Vec<String>> {
        Ok(self
            .rds
            .db_instances()
            .await?
            .into_iter()
            .filter(|db| db.multi_az)
            .filter(|db| db.availability_zone == request.az)
            .filter(|db| request.names.is_empty() || request.names.contains(&db.id))
            .filter(|db| tags_match(&db.tags, &request.tags))
            .map(|db| db.id)
            .collect())
    }

    /// Multi-AZ clusters whose current writer sits in the target AZ.
    async fn target_clusters(&self, request: &FailureRequest) -> AzResult<Vec<String>> {
        let mut targets = Vec::new();
        for cluster in self.rds.db_clusters().await? {
            if !cluster.multi_az
                || !(request.names.is_empty() || request.names.contains(&cluster.id))
                || !tags_match(&cluster.tags, &request.tags)
            {
                continue;
            }
            let Some(writer) = &cluster.writer_instance_id else {
                tracing::warn!(cluster = %cluster.id, "Cluster reports no writer member, skipping");
                continue;
            };
            if self.rds.instance_az(writer).await? == request.az {
                targets.push(cluster.id);
            }
        }
        Ok(targets)
    }
}

#[async_trait]
impl<R: RdsApi> FaultStrategy for RdsFault<'_, R> {
    type State = RdsState;

    fn service(&self) -> Service {
        Service::Rds
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let instances = self.target_instances(request).await?;
        let clusters = self.target_clusters(request).await?;
        if instances.is_empty() && clusters.is_empty() {
            return Err(AzError::discovery(
                Service::Rds,
                format!(
                    "no multi-AZ DB instances or clusters have their primary in AZ {}",
                    request.az
                ),
            ));
        }
        tracing::info!(
            instances = ?instances,
            clusters = ?clusters,
            "Failing over RDS primaries"
        );

        if request.dry_run {
            return Ok(RdsState {
                db_instances: RdsOutcome {
                    success: RdsIdLists {
                        db_instance_identifiers: instances,
                        db_cluster_identifiers: clusters,
                    },
                    failed: RdsIdLists::default(),
                },
            });
        }

        let instance_outcome = join_bounded(DEFAULT_CONCURRENCY, instances, |id| async move {
            match self.rds.reboot_with_failover(&id).await {
                Ok(()) => Ok(id),
                Err(e) => Err((id, e)),
            }
        })
        .await;
        let cluster_outcome = join_bounded(DEFAULT_CONCURRENCY, clusters, |id| async move {
            match self.rds.failover_cluster(&id).await {
                Ok(()) => Ok(id),
                Err(e) => Err((id, e)),
            }
        })
        .await;

        Ok(RdsState {
            db_instances: RdsOutcome {
                success: RdsIdLists {
                    db_instance_identifiers: instance_outcome.success,
                    db_cluster_identifiers: cluster_outcome.success,
                },
                failed: RdsIdLists {
                    db_instance_identifiers: instance_outcome.failed,
                    db_cluster_identifiers: cluster_outcome.failed,
                },
            },
        })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        // The failover already promoted a standby; forcing a failback would
        // be a second disruption, not a restore.
        tracing::info!(
            az = %document.availability_zone,
            "RDS failovers are self-healing, nothing to revert"
        );
        Ok(())
    }
}

/// Forces a failover for the matched multi-AZ instances and clusters and
/// writes the rollback state file.
pub async fn fail_az<R: RdsApi>(
    rds: &R,
    request: &FailureRequest,
) -> AzResult<StateDocument<RdsState>> {
    engine::fail_az(&RdsFault { rds }, request).await
}

/// Validates and discards the state file; the failover itself has no
/// inverse to apply.
pub async fn recover_az<R: RdsApi>(rds: &R, state_path: &Path) -> AzResult<bool> {
    engine::recover_az(&RdsFault { rds }, state_path).await
}
