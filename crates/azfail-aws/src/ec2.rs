//! EC2 AZ failure.
//!
//! Network mode isolates every matched subnet in the target AZ behind a
//! deny-all blackhole NACL. Instance mode stops or terminates the matched
//! instances, honoring spot lifecycle rules. One failure mode per run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, AzError, AzResult, FailureMode, FailureRequest, FaultStrategy, Service, StateDocument,
};

use crate::api::{
    Ec2Api, EntryOutcome, InstanceInfo, InstanceLifecycle, InstanceState, InstanceTransition,
    SpotRequestKind, SubnetInfo,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ec2State {
    #[serde(rename = "Subnets", skip_serializing_if = "Vec::is_empty", default)]
    pub subnets: Vec<SubnetRecord>,
    #[serde(rename = "Instances", skip_serializing_if = "Vec::is_empty", default)]
    pub instances: Vec<InstanceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubnetRecord {
    #[serde(rename = "SubnetId")]
    pub subnet_id: String,
    #[serde(rename = "VpcId")]
    pub vpc_id: String,
    #[serde(rename = "Before")]
    pub before: NaclBefore,
    #[serde(rename = "After")]
    pub after: NaclAfter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NaclBefore {
    #[serde(rename = "NetworkAclId")]
    pub network_acl_id: String,
    #[serde(rename = "NetworkAclAssociationId")]
    pub network_acl_association_id: String,
}

/// Populated only when the blackhole was actually installed; a dry run
/// leaves both fields empty because the blackhole ACL never exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NaclAfter {
    #[serde(
        rename = "NetworkAclId",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub network_acl_id: Option<String>,
    #[serde(
        rename = "NetworkAclAssociationId",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub network_acl_association_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    #[serde(rename = "InstanceId")]
    pub instance_id: String,
    #[serde(rename = "Before")]
    pub before: InstanceStateRecord,
    #[serde(rename = "After")]
    pub after: InstanceStateRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceStateRecord {
    #[serde(rename = "State")]
    pub state: InstanceState,
}

impl InstanceStateRecord {
    fn new(state: InstanceState) -> Self {
        Self { state }
    }
}

/// Installs deny-all entries for both directions on a fresh blackhole ACL.
/// A taken rule number is retried with the next lower number.
async fn install_deny_entries<E: Ec2Api>(ec2: &E, acl_id: &str) -> AzResult<()> {
    for egress in [false, true] {
        let mut rule_number = 1;
        loop {
            match ec2.create_deny_all_entry(acl_id, rule_number, egress).await? {
                EntryOutcome::Created => break,
                EntryOutcome::RuleNumberTaken => {
                    tracing::warn!(
                        acl = %acl_id,
                        rule_number,
                        egress,
                        "NACL rule number taken, retrying with a lower one"
                    );
                    rule_number -= 1;
                }
            }
        }
    }
    Ok(())
}

/// Repoints the given subnets at a blackhole NACL, one blackhole per VPC.
/// Subnets already behind a blackhole ACL are skipped, which makes repeated
/// invocations safe. Shared with the EKS module for nodegroup subnets.
pub(crate) async fn blackhole_subnets<E: Ec2Api>(
    ec2: &E,
    subnets: &[SubnetInfo],
    dry_run: bool,
) -> AzResult<Vec<SubnetRecord>> {
    let mut by_vpc: BTreeMap<String, Vec<&SubnetInfo>> = BTreeMap::new();
    for subnet in subnets {
        by_vpc.entry(subnet.vpc_id.clone()).or_default().push(subnet);
    }

    let mut records = Vec::new();
    for (vpc_id, vpc_subnets) in &by_vpc {
        let subnet_ids: Vec<String> = vpc_subnets.iter().map(|s| s.subnet_id.clone()).collect();
        let target_ids: BTreeSet<&str> = subnet_ids.iter().map(String::as_str).collect();
        let acls = ec2.network_acls_for_subnets(vpc_id, &subnet_ids).await?;

        let mut blackhole_id: Option<String> = None;
        for acl in &acls {
            if acl.is_blackhole {
                tracing::warn!(
                    vpc = %vpc_id,
                    acl = %acl.network_acl_id,
                    "Subnets already associated with a blackhole NACL, skipping"
                );
                continue;
            }
            for assoc in &acl.associations {
                if !target_ids.contains(assoc.subnet_id.as_str()) {
                    continue;
                }
                let after = if dry_run {
                    NaclAfter::default()
                } else {
                    let acl_id = match &blackhole_id {
                        Some(id) => id.clone(),
                        None => {
                            let id = ec2.create_blackhole_acl(vpc_id).await?;
                            install_deny_entries(ec2, &id).await?;
                            tracing::info!(vpc = %vpc_id, acl = %id, "Created blackhole NACL");
                            blackhole_id = Some(id.clone());
                            id
                        }
                    };
                    let new_assoc = ec2
                        .replace_network_acl_association(&assoc.association_id, &acl_id)
                        .await?;
                    tracing::info!(
                        subnet = %assoc.subnet_id,
                        acl = %acl_id,
                        "Subnet isolated behind blackhole NACL"
                    );
                    NaclAfter {
                        network_acl_id: Some(acl_id),
                        network_acl_association_id: Some(new_assoc),
                    }
                };
                records.push(SubnetRecord {
                    subnet_id: assoc.subnet_id.clone(),
                    vpc_id: vpc_id.clone(),
                    before: NaclBefore {
                        network_acl_id: acl.network_acl_id.clone(),
                        network_acl_association_id: assoc.association_id.clone(),
                    },
                    after,
                });
            }
        }
    }
    Ok(records)
}

/// Restores original NACL associations, then deletes the blackhole ACLs once
/// nothing references them. Shared with the EKS module.
pub(crate) async fn restore_subnets<E: Ec2Api>(ec2: &E, records: &[SubnetRecord]) -> AzResult<()> {
    let mut blackhole_ids: BTreeSet<String> = BTreeSet::new();
    for record in records {
        let (Some(blackhole), Some(association_id)) = (
            &record.after.network_acl_id,
            &record.after.network_acl_association_id,
        ) else {
            continue;
        };
        ec2.replace_network_acl_association(association_id, &record.before.network_acl_id)
            .await?;
        tracing::info!(
            subnet = %record.subnet_id,
            acl = %record.before.network_acl_id,
            "Restored original NACL association"
        );
        blackhole_ids.insert(blackhole.clone());
    }
    for acl_id in &blackhole_ids {
        ec2.delete_network_acl(acl_id).await?;
        tracing::info!(acl = %acl_id, "Deleted blackhole NACL");
    }
    Ok(())
}

struct InstancePartition {
    normal: Vec<String>,
    persistent_spot: Vec<String>,
    one_time_requests: Vec<String>,
    one_time_instances: Vec<String>,
}

async fn partition_instances<E: Ec2Api>(
    ec2: &E,
    infos: &[InstanceInfo],
) -> AzResult<InstancePartition> {
    let mut normal = Vec::new();
    let mut spot_request_ids = Vec::new();
    let mut scheduled = Vec::new();
    for info in infos {
        match info.lifecycle {
            InstanceLifecycle::Normal => normal.push(info.instance_id.clone()),
            InstanceLifecycle::Spot => match &info.spot_request_id {
                Some(request_id) => spot_request_ids.push(request_id.clone()),
                None => normal.push(info.instance_id.clone()),
            },
            InstanceLifecycle::Scheduled => scheduled.push(info.instance_id.clone()),
        }
    }
    if !scheduled.is_empty() {
        return Err(AzError::unsupported(
            Service::Ec2,
            format!("scheduled instances cannot be failed: {scheduled:?}"),
        ));
    }

    let mut persistent_spot = Vec::new();
    let mut one_time_requests = Vec::new();
    let mut one_time_instances = Vec::new();
    if !spot_request_ids.is_empty() {
        for request in ec2.spot_requests(&spot_request_ids).await? {
            match request.kind {
                SpotRequestKind::Persistent => persistent_spot.push(request.instance_id),
                SpotRequestKind::OneTime => {
                    one_time_requests.push(request.request_id);
                    one_time_instances.push(request.instance_id);
                }
            }
        }
    }
    Ok(InstancePartition {
        normal,
        persistent_spot,
        one_time_requests,
        one_time_instances,
    })
}

fn records_from_transitions(transitions: Vec<InstanceTransition>) -> Vec<InstanceRecord> {
    transitions
        .into_iter()
        .map(|t| InstanceRecord {
            instance_id: t.instance_id,
            before: InstanceStateRecord::new(t.previous_state),
            after: InstanceStateRecord::new(t.current_state),
        })
        .collect()
}

/// Stops or terminates the given instances per their lifecycle. One-time
/// spot requests are cancelled before their instances are terminated so the
/// fleet does not replace them. Shared with the EKS module.
pub(crate) async fn fail_instances<E: Ec2Api>(
    ec2: &E,
    infos: &[InstanceInfo],
    dry_run: bool,
) -> AzResult<Vec<InstanceRecord>> {
    let partition = partition_instances(ec2, infos).await?;

    if dry_run {
        let planned: BTreeMap<&str, InstanceState> = partition
            .normal
            .iter()
            .chain(&partition.persistent_spot)
            .map(|id| (id.as_str(), InstanceState::Stopping))
            .chain(
                partition
                    .one_time_instances
                    .iter()
                    .map(|id| (id.as_str(), InstanceState::Terminated)),
            )
            .collect();
        return Ok(infos
            .iter()
            .filter_map(|info| {
                planned.get(info.instance_id.as_str()).map(|target| InstanceRecord {
                    instance_id: info.instance_id.clone(),
                    before: InstanceStateRecord::new(info.state),
                    after: InstanceStateRecord::new(*target),
                })
            })
            .collect());
    }

    let mut records = Vec::new();
    if !partition.normal.is_empty() {
        tracing::info!(instances = ?partition.normal, "Stopping on-demand instances");
        records.extend(records_from_transitions(
            ec2.stop_instances(&partition.normal, false).await?,
        ));
    }
    if !partition.persistent_spot.is_empty() {
        tracing::info!(instances = ?partition.persistent_spot, "Force-stopping persistent spot instances");
        records.extend(records_from_transitions(
            ec2.stop_instances(&partition.persistent_spot, true).await?,
        ));
    }
    if !partition.one_time_instances.is_empty() {
        // Cancel first; terminating while the request is open respawns the
        // instance.
        tracing::info!(requests = ?partition.one_time_requests, "Cancelling one-time spot requests");
        ec2.cancel_spot_requests(&partition.one_time_requests).await?;
        records.extend(records_from_transitions(
            ec2.terminate_instances(&partition.one_time_instances).await?,
        ));
    }
    Ok(records)
}

/// Confirms every stopped instance is startable again, returning the ids to
/// start. An instance still in `stopping` blocks the whole rollback so it
/// can be retried once the stop settles. Shared with the EKS module.
pub(crate) async fn startable_instances<E: Ec2Api>(
    ec2: &E,
    records: &[InstanceRecord],
) -> AzResult<Vec<String>> {
    let mut startable = Vec::new();
    for record in records {
        let was_live = matches!(
            record.before.state,
            InstanceState::Pending | InstanceState::Running
        );
        if !was_live || record.after.state != InstanceState::Stopping {
            continue;
        }
        match ec2.instance_state(&record.instance_id).await? {
            InstanceState::Stopped => startable.push(record.instance_id.clone()),
            InstanceState::Stopping => {
                return Err(AzError::rollback_blocked(
                    Service::Ec2,
                    format!(
                        "instance {} is still stopping, retry the rollback later",
                        record.instance_id
                    ),
                ));
            }
            other => {
                tracing::warn!(
                    instance = %record.instance_id,
                    state = %other,
                    "Instance not in a startable state, skipping"
                );
            }
        }
    }
    Ok(startable)
}

struct Ec2Fault<'a, E> {
    ec2: &'a E,
}

#[async_trait]
impl<E: Ec2Api> FaultStrategy for Ec2Fault<'_, E> {
    type State = Ec2State;

    fn service(&self) -> Service {
        Service::Ec2
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        match request.failure_mode_or_network() {
            FailureMode::Network => {
                let subnets = self
                    .ec2
                    .subnets(Some(&request.az), &request.tags, &request.names)
                    .await?;
                if subnets.is_empty() {
                    return Err(AzError::discovery(
                        Service::Ec2,
                        format!("no subnets match both the filter and AZ {}", request.az),
                    ));
                }
                tracing::info!(count = subnets.len(), az = %request.az, "Blackholing subnets");
                let records = blackhole_subnets(self.ec2, &subnets, request.dry_run).await?;
                if records.is_empty() {
                    return Err(AzError::discovery(
                        Service::Ec2,
                        "every matched subnet is already behind a blackhole NACL",
                    ));
                }
                Ok(Ec2State {
                    subnets: records,
                    instances: Vec::new(),
                })
            }
            FailureMode::Instance => {
                let infos = self
                    .ec2
                    .instances(
                        &request.az,
                        &request.tags,
                        &request.names,
                        &[InstanceState::Pending, InstanceState::Running],
                    )
                    .await?;
                if infos.is_empty() {
                    return Err(AzError::discovery(
                        Service::Ec2,
                        format!("no running instances match both the filter and AZ {}", request.az),
                    ));
                }
                let records = fail_instances(self.ec2, &infos, request.dry_run).await?;
                Ok(Ec2State {
                    subnets: Vec::new(),
                    instances: records,
                })
            }
        }
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        // Probe instance states before mutating anything so a blocked
        // rollback leaves the world untouched and retryable.
        let startable = startable_instances(self.ec2, &document.state.instances).await?;
        restore_subnets(self.ec2, &document.state.subnets).await?;
        if !startable.is_empty() {
            tracing::info!(instances = ?startable, "Starting stopped instances");
            self.ec2.start_instances(&startable).await?;
        }
        Ok(())
    }
}

/// Simulates the loss of one AZ for EC2 subnets or instances and writes the
/// rollback state file.
pub async fn fail_az<E: Ec2Api>(
    ec2: &E,
    request: &FailureRequest,
) -> AzResult<StateDocument<Ec2State>> {
    engine::fail_az(&Ec2Fault { ec2 }, request).await
}

/// Restores NACL associations and stopped instances from the state file and
/// deletes it.
pub async fn recover_az<E: Ec2Api>(ec2: &E, state_path: &Path) -> AzResult<bool> {
    engine::recover_az(&Ec2Fault { ec2 }, state_path).await
}
