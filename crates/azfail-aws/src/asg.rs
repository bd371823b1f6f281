//! Auto Scaling group AZ failure.
//!
//! A single-AZ group is shrunk to zero capacity; a multi-AZ group keeps its
//! capacity but loses every subnet in the target AZ from its
//! VPCZoneIdentifier, with AZRebalance suspended first so the group does not
//! immediately heal itself back into the failed zone.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, AzError, AzResult, FailureRequest, FaultStrategy, Service, StateDocument,
};

use crate::api::{AsgDetail, AutoScalingApi, Ec2Api};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsgState {
    #[serde(rename = "AutoScalingGroups")]
    pub auto_scaling_groups: Vec<AsgRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsgRecord {
    #[serde(rename = "AutoScalingGroupName")]
    pub name: String,
    #[serde(rename = "Before")]
    pub before: AsgAttributes,
    #[serde(rename = "After")]
    pub after: AsgAttributes,
}

/// Either the capacity triple (single-AZ groups) or the subnet set plus the
/// AZRebalance flag (multi-AZ groups) is populated, never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsgAttributes {
    #[serde(rename = "MinSize", skip_serializing_if = "Option::is_none", default)]
    pub min_size: Option<i32>,
    #[serde(rename = "MaxSize", skip_serializing_if = "Option::is_none", default)]
    pub max_size: Option<i32>,
    #[serde(
        rename = "DesiredCapacity",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub desired_capacity: Option<i32>,
    #[serde(rename = "SubnetIds", skip_serializing_if = "Option::is_none", default)]
    pub subnet_ids: Option<Vec<String>>,
    #[serde(
        rename = "AZRebalance",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub az_rebalance: Option<bool>,
}

impl AsgAttributes {
    fn capacity(min: i32, max: i32, desired: i32) -> Self {
        Self {
            min_size: Some(min),
            max_size: Some(max),
            desired_capacity: Some(desired),
            ..Self::default()
        }
    }

    fn placement(subnet_ids: Vec<String>, az_rebalance: bool) -> Self {
        Self {
            subnet_ids: Some(subnet_ids),
            az_rebalance: Some(az_rebalance),
            ..Self::default()
        }
    }
}

enum GroupPlan {
    /// The group only spans the target AZ; nothing is left to run on.
    ZeroCapacity,
    /// The group spans other AZs too; evict the target AZ's subnets.
    RemoveAzSubnets,
}

fn plan_group(detail: &AsgDetail) -> GroupPlan {
    if detail.availability_zones.len() <= 1 {
        GroupPlan::ZeroCapacity
    } else {
        GroupPlan::RemoveAzSubnets
    }
}

/// Resolves the target group names: the explicit name list when one was
/// given, otherwise the tag-matched set, always intersected with the groups
/// actually spanning the target AZ.
async fn locate_groups<A: AutoScalingApi>(
    asg: &A,
    request: &FailureRequest,
) -> AzResult<Vec<String>> {
    let candidates: BTreeSet<String> = if request.names.is_empty() {
        asg.group_names_by_tags(&request.tags).await?.into_iter().collect()
    } else {
        // Validate the explicit names exist before intersecting.
        asg.groups_by_names(&request.names)
            .await?
            .into_iter()
            .map(|g| g.name)
            .collect()
    };
    let in_az: BTreeSet<String> = asg
        .group_names_in_az(&request.az)
        .await?
        .into_iter()
        .collect();

    let targets: Vec<String> = candidates.intersection(&in_az).cloned().collect();
    if targets.is_empty() {
        return Err(AzError::discovery(
            Service::Asg,
            format!("no Auto Scaling groups match both the filter and AZ {}", request.az),
        ));
    }
    Ok(targets)
}

/// Applies the AZ failure to one group and returns its Before/After record.
/// Shared with the EKS module, which fails the node groups' backing ASGs.
pub(crate) async fn fail_one_group<A, E>(
    asg: &A,
    ec2: &E,
    name: &str,
    az: &str,
    dry_run: bool,
) -> AzResult<AsgRecord>
where
    A: AutoScalingApi,
    E: Ec2Api,
{
    let names = [name.to_string()];
    let details = asg.groups_by_names(&names).await?;
    let detail = details
        .into_iter()
        .next()
        .ok_or_else(|| AzError::discovery(Service::Asg, format!("group {name} not found")))?;

    match plan_group(&detail) {
        GroupPlan::ZeroCapacity => {
            tracing::info!(group = %name, "Scaling single-AZ group to zero capacity");
            if !dry_run {
                asg.set_capacity(name, 0, 0, 0).await?;
            }
            Ok(AsgRecord {
                name: name.to_string(),
                before: AsgAttributes::capacity(
                    detail.min_size,
                    detail.max_size,
                    detail.desired_capacity,
                ),
                after: AsgAttributes::capacity(0, 0, 0),
            })
        }
        GroupPlan::RemoveAzSubnets => {
            let rebalance_was_active = !detail.az_rebalance_suspended;
            // Suspend rebalancing before shrinking the subnet set so the
            // group cannot re-spread into the failed AZ mid-change.
            tracing::info!(group = %name, az = %az, "Removing AZ subnets from multi-AZ group");
            if !dry_run {
                asg.suspend_az_rebalance(name).await?;
            }

            let subnets = ec2.subnets(None, &[], &detail.subnet_ids).await?;
            let surviving: Vec<String> = subnets
                .iter()
                .filter(|s| s.availability_zone != az)
                .map(|s| s.subnet_id.clone())
                .collect();
            if surviving.is_empty() {
                return Err(AzError::discovery(
                    Service::Asg,
                    format!("group {name} has no subnets outside AZ {az}"),
                ));
            }
            if !dry_run {
                asg.set_subnets(name, &surviving).await?;
            }

            Ok(AsgRecord {
                name: name.to_string(),
                before: AsgAttributes::placement(detail.subnet_ids.clone(), rebalance_was_active),
                after: AsgAttributes::placement(surviving, false),
            })
        }
    }
}

/// Restores one group from its record. Shared with the EKS module.
pub(crate) async fn revert_one_group<A: AutoScalingApi>(
    asg: &A,
    record: &AsgRecord,
) -> AzResult<()> {
    if let Some(subnet_ids) = &record.before.subnet_ids {
        if record.before.az_rebalance == Some(true) {
            asg.resume_az_rebalance(&record.name).await?;
        }
        tracing::info!(group = %record.name, "Restoring group subnets");
        asg.set_subnets(&record.name, subnet_ids).await?;
    }
    if let (Some(min), Some(max), Some(desired)) = (
        record.before.min_size,
        record.before.max_size,
        record.before.desired_capacity,
    ) {
        tracing::info!(group = %record.name, min, max, desired, "Restoring group capacity");
        asg.set_capacity(&record.name, min, max, desired).await?;
    }
    Ok(())
}

struct AsgFault<'a, A, E> {
    asg: &'a A,
    ec2: &'a E,
}

#[async_trait]
impl<A, E> FaultStrategy for AsgFault<'_, A, E>
where
    A: AutoScalingApi,
    E: Ec2Api,
{
    type State = AsgState;

    fn service(&self) -> Service {
        Service::Asg
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let targets = locate_groups(self.asg, request).await?;
        tracing::info!(groups = ?targets, az = %request.az, "Failing Auto Scaling groups");

        let mut records = Vec::with_capacity(targets.len());
        for name in &targets {
            records.push(
                fail_one_group(self.asg, self.ec2, name, &request.az, request.dry_run).await?,
            );
        }
        Ok(AsgState {
            auto_scaling_groups: records,
        })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        for record in &document.state.auto_scaling_groups {
            revert_one_group(self.asg, record).await?;
        }
        Ok(())
    }
}

/// Simulates the loss of one AZ for the matched Auto Scaling groups and
/// writes the rollback state file.
pub async fn fail_az<A, E>(
    asg: &A,
    ec2: &E,
    request: &FailureRequest,
) -> AzResult<StateDocument<AsgState>>
where
    A: AutoScalingApi,
    E: Ec2Api,
{
    engine::fail_az(&AsgFault { asg, ec2 }, request).await
}

/// Restores the groups recorded in the state file and deletes it.
pub async fn recover_az<A, E>(asg: &A, ec2: &E, state_path: &Path) -> AzResult<bool>
where
    A: AutoScalingApi,
    E: Ec2Api,
{
    engine::recover_az(&AsgFault { asg, ec2 }, state_path).await
}
