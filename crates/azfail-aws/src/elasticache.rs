//! ElastiCache AZ failure.
//!
//! Triggers a test failover for every node group whose primary sits in the
//! target AZ, across the matched replication groups. Failover completion is
//! asynchronous on the AWS side, so recovery only validates and discards
//! the state file.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, join_bounded, AzError, AzResult, FailureRequest, FaultStrategy, Service,
    StateDocument, DEFAULT_CONCURRENCY,
};

use crate::api::{tags_match, CacheNodeGroup, ElastiCacheApi};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheState {
    #[serde(rename = "ReplicationGroups")]
    pub replication_groups: CacheOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheOutcome {
    #[serde(rename = "Success")]
    pub success: Vec<NodeGroupRef>,
    #[serde(rename = "Failed")]
    pub failed: Vec<NodeGroupRef>,
}

/// One shard targeted for failover, addressed by its replication group and
/// node group ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeGroupRef {
    #[serde(rename = "ReplicationGroupId")]
    pub replication_group_id: String,
    #[serde(rename = "NodeGroupId")]
    pub node_group_id: String,
}

impl fmt::Display for NodeGroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.replication_group_id, self.node_group_id)
    }
}

/// Whether this node group's primary sits in the given AZ. Cluster-mode
/// groups do not report member roles, so any member in the AZ counts.
fn primary_in_az(node_group: &CacheNodeGroup, az: &str) -> bool {
    let reports_roles = node_group.members.iter().any(|m| m.is_primary);
    node_group.members.iter().any(|m| {
        m.preferred_availability_zone.as_deref() == Some(az) && (!reports_roles || m.is_primary)
    })
}

struct CacheFault<'a, C> {
    cache: &'a C,
}

impl<C: ElastiCacheApi> CacheFault<'_, C> {
    async fn target_node_groups(&self, request: &FailureRequest) -> AzResult<Vec<NodeGroupRef>> {
        let mut targets = Vec::new();
        for group in self.cache.replication_groups().await? {
            if !(request.names.is_empty() || request.names.contains(&group.id)) {
                continue;
            }
            if !request.tags.is_empty() {
                let tags = self.cache.tags_for(&group.arn).await?;
                if !tags_match(&tags, &request.tags) {
                    continue;
                }
            }
            if !group.automatic_failover_enabled {
                tracing::warn!(group = %group.id, "Automatic failover disabled, skipping replication group");
                continue;
            }
            for node_group in &group.node_groups {
                if primary_in_az(node_group, &request.az) {
                    targets.push(NodeGroupRef {
                        replication_group_id: group.id.clone(),
                        node_group_id: node_group.node_group_id.clone(),
                    });
                }
            }
        }
        Ok(targets)
    }
}

#[async_trait]
impl<C: ElastiCacheApi> FaultStrategy for CacheFault<'_, C> {
    type State = CacheState;

    fn service(&self) -> Service {
        Service::Elasticache
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let targets = self.target_node_groups(request).await?;
        if targets.is_empty() {
            return Err(AzError::discovery(
                Service::Elasticache,
                format!("no replication group has a primary in AZ {}", request.az),
            ));
        }
        tracing::info!(node_groups = ?targets.iter().map(ToString::to_string).collect::<Vec<_>>(), "Failing over cache primaries");

        if request.dry_run {
            return Ok(CacheState {
                replication_groups: CacheOutcome {
                    success: targets,
                    failed: Vec::new(),
                },
            });
        }

        let outcome = join_bounded(DEFAULT_CONCURRENCY, targets, |target| async move {
            match self
                .cache
                .test_failover(&target.replication_group_id, &target.node_group_id)
                .await
            {
                Ok(()) => Ok(target),
                Err(e) => Err((target, e)),
            }
        })
        .await;

        Ok(CacheState {
            replication_groups: CacheOutcome {
                success: outcome.success,
                failed: outcome.failed,
            },
        })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        // The test failover promotes a replica on its own; there is no
        // inverse call to make.
        tracing::info!(
            az = %document.availability_zone,
            "Cache failovers are self-healing, nothing to revert"
        );
        Ok(())
    }
}

/// Triggers test failovers for the matched node groups and writes the
/// rollback state file.
pub async fn fail_az<C: ElastiCacheApi>(
    cache: &C,
    request: &FailureRequest,
) -> AzResult<StateDocument<CacheState>> {
    engine::fail_az(&CacheFault { cache }, request).await
}

/// Validates and discards the state file; the failover itself has no
/// inverse to apply.
pub async fn recover_az<C: ElastiCacheApi>(cache: &C, state_path: &Path) -> AzResult<bool> {
    engine::recover_az(&CacheFault { cache }, state_path).await
}
