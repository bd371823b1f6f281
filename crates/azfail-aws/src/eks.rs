//! EKS AZ failure.
//!
//! Targets the managed nodegroups of tag-matched clusters: their backing
//! Auto Scaling groups are failed the same way standalone groups are, and
//! the chosen failure mode then either blackholes the nodegroup subnets in
//! the target AZ or stops the nodegroup instances there.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, AzError, AzResult, FailureMode, FailureRequest, FaultStrategy, Service, StateDocument,
};

use crate::api::{AutoScalingApi, Ec2Api, EksApi, InstanceState};
use crate::asg::{fail_one_group, revert_one_group, AsgRecord};
use crate::ec2::{
    blackhole_subnets, fail_instances, restore_subnets, startable_instances, InstanceRecord,
    SubnetRecord,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EksState {
    #[serde(rename = "Clusters")]
    pub clusters: Vec<ClusterRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterRecord {
    #[serde(rename = "ClusterName")]
    pub cluster_name: String,
    #[serde(rename = "NodeGroups")]
    pub node_groups: Vec<NodegroupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodegroupRecord {
    #[serde(rename = "NodeGroupName")]
    pub name: String,
    #[serde(rename = "AutoScalingGroups")]
    pub auto_scaling_groups: Vec<AsgRecord>,
    #[serde(rename = "Subnets", skip_serializing_if = "Vec::is_empty", default)]
    pub subnets: Vec<SubnetRecord>,
    #[serde(rename = "Instances", skip_serializing_if = "Vec::is_empty", default)]
    pub instances: Vec<InstanceRecord>,
}

struct EksFault<'a, K, A, E> {
    eks: &'a K,
    asg: &'a A,
    ec2: &'a E,
}

impl<K, A, E> EksFault<'_, K, A, E>
where
    K: EksApi,
    A: AutoScalingApi,
    E: Ec2Api,
{
    async fn fail_cluster(
        &self,
        cluster_name: &str,
        request: &FailureRequest,
    ) -> AzResult<ClusterRecord> {
        let mut node_groups = Vec::new();
        for nodegroup in self.eks.nodegroups(cluster_name).await? {
            let details = self.asg.groups_by_names(&nodegroup.asg_names).await?;
            let in_az: Vec<_> = details
                .iter()
                .filter(|d| d.availability_zones.iter().any(|z| z == &request.az))
                .collect();
            if in_az.is_empty() {
                tracing::debug!(
                    cluster = %cluster_name,
                    nodegroup = %nodegroup.name,
                    "Nodegroup has no capacity in the target AZ, skipping"
                );
                continue;
            }

            let mut asg_records = Vec::with_capacity(in_az.len());
            for detail in &in_az {
                asg_records.push(
                    fail_one_group(self.asg, self.ec2, &detail.name, &request.az, request.dry_run)
                        .await?,
                );
            }

            let mut subnets = Vec::new();
            let mut instances = Vec::new();
            match request.failure_mode_or_network() {
                FailureMode::Network => {
                    let az_subnets = self
                        .ec2
                        .subnets(Some(&request.az), &[], &nodegroup.subnet_ids)
                        .await?;
                    subnets = blackhole_subnets(self.ec2, &az_subnets, request.dry_run).await?;
                }
                FailureMode::Instance => {
                    let instance_ids: Vec<String> = in_az
                        .iter()
                        .flat_map(|d| d.instance_ids.iter().cloned())
                        .collect();
                    if !instance_ids.is_empty() {
                        let infos = self
                            .ec2
                            .instances(
                                &request.az,
                                &[],
                                &instance_ids,
                                &[InstanceState::Pending, InstanceState::Running],
                            )
                            .await?;
                        instances = fail_instances(self.ec2, &infos, request.dry_run).await?;
                    }
                }
            }

            node_groups.push(NodegroupRecord {
                name: nodegroup.name,
                auto_scaling_groups: asg_records,
                subnets,
                instances,
            });
        }
        Ok(ClusterRecord {
            cluster_name: cluster_name.to_string(),
            node_groups,
        })
    }
}

#[async_trait]
impl<K, A, E> FaultStrategy for EksFault<'_, K, A, E>
where
    K: EksApi,
    A: AutoScalingApi,
    E: Ec2Api,
{
    type State = EksState;

    fn service(&self) -> Service {
        Service::Eks
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let cluster_names = if request.names.is_empty() {
            self.eks.cluster_names_by_tags(&request.tags).await?
        } else {
            request.names.clone()
        };
        if cluster_names.is_empty() {
            return Err(AzError::discovery(
                Service::Eks,
                "no EKS clusters match the requested tags",
            ));
        }
        tracing::info!(clusters = ?cluster_names, az = %request.az, "Failing EKS nodegroups");

        let mut clusters = Vec::with_capacity(cluster_names.len());
        for name in &cluster_names {
            clusters.push(self.fail_cluster(name, request).await?);
        }
        if clusters.iter().all(|c| c.node_groups.is_empty()) {
            return Err(AzError::discovery(
                Service::Eks,
                format!("no nodegroup has capacity in AZ {}", request.az),
            ));
        }
        Ok(EksState { clusters })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        // Preflight every stopped instance first so a still-stopping node
        // blocks the rollback before any mutation happens.
        let mut startable = Vec::new();
        for cluster in &document.state.clusters {
            for nodegroup in &cluster.node_groups {
                startable.extend(startable_instances(self.ec2, &nodegroup.instances).await?);
            }
        }

        for cluster in &document.state.clusters {
            for nodegroup in &cluster.node_groups {
                for record in &nodegroup.auto_scaling_groups {
                    revert_one_group(self.asg, record).await?;
                }
                restore_subnets(self.ec2, &nodegroup.subnets).await?;
            }
        }
        if !startable.is_empty() {
            tracing::info!(instances = ?startable, "Starting stopped nodegroup instances");
            self.ec2.start_instances(&startable).await?;
        }
        Ok(())
    }
}

/// Simulates the loss of one AZ for the matched EKS clusters' nodegroups and
/// writes the rollback state file.
pub async fn fail_az<K, A, E>(
    eks: &K,
    asg: &A,
    ec2: &E,
    request: &FailureRequest,
) -> AzResult<StateDocument<EksState>>
where
    K: EksApi,
    A: AutoScalingApi,
    E: Ec2Api,
{
    engine::fail_az(&EksFault { eks, asg, ec2 }, request).await
}

/// Restores nodegroup ASGs, subnets and instances from the state file and
/// deletes it.
pub async fn recover_az<K, A, E>(eks: &K, asg: &A, ec2: &E, state_path: &Path) -> AzResult<bool>
where
    K: EksApi,
    A: AutoScalingApi,
    E: Ec2Api,
{
    engine::recover_az(&EksFault { eks, asg, ec2 }, state_path).await
}
