//! Classic ELB AZ failure.
//!
//! Load balancers in a non-default VPC are detached from their subnets in
//! the target AZ; load balancers in the default VPC have the AZ itself
//! disabled. Rollback re-attaches the removed subnets or re-enables the AZ.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, AzError, AzResult, FailureRequest, FaultStrategy, Service, StateDocument,
};

use crate::api::{filter_tagged, ClassicElbApi, ClassicLbDetail, Ec2Api};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElbState {
    #[serde(rename = "LoadBalancers")]
    pub load_balancers: Vec<ClassicLbRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassicLbRecord {
    #[serde(rename = "LoadBalancerName")]
    pub name: String,
    #[serde(rename = "Before")]
    pub before: ClassicLbAttributes,
    #[serde(rename = "After")]
    pub after: ClassicLbAttributes,
}

/// Subnet ids for non-default-VPC load balancers, AZ names for default-VPC
/// ones. Exactly one of the two is populated per record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassicLbAttributes {
    #[serde(rename = "SubnetIds", skip_serializing_if = "Option::is_none", default)]
    pub subnet_ids: Option<Vec<String>>,
    #[serde(
        rename = "AvailabilityZones",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub availability_zones: Option<Vec<String>>,
}

fn removed<'a>(before: &'a [String], after: &[String]) -> Vec<String> {
    let kept: BTreeSet<&str> = after.iter().map(String::as_str).collect();
    before
        .iter()
        .filter(|v| !kept.contains(v.as_str()))
        .cloned()
        .collect::<Vec<_>>()
}

struct ElbFault<'a, L, E> {
    elb: &'a L,
    ec2: &'a E,
}

impl<L, E> ElbFault<'_, L, E>
where
    L: ClassicElbApi,
    E: Ec2Api,
{
    async fn fail_default_vpc_lb(
        &self,
        detail: &ClassicLbDetail,
        az: &str,
        dry_run: bool,
    ) -> AzResult<ClassicLbRecord> {
        if detail.availability_zones.len() < 2 {
            return Err(AzError::unsupported(
                Service::Elb,
                format!(
                    "load balancer {} spans only {} AZ, disabling one requires at least two",
                    detail.name,
                    detail.availability_zones.len()
                ),
            ));
        }
        let remaining = if dry_run {
            detail
                .availability_zones
                .iter()
                .filter(|z| z.as_str() != az)
                .cloned()
                .collect()
        } else {
            self.elb.disable_az(&detail.name, az).await?
        };
        tracing::info!(lb = %detail.name, az = %az, "Disabled AZ on default-VPC load balancer");
        Ok(ClassicLbRecord {
            name: detail.name.clone(),
            before: ClassicLbAttributes {
                availability_zones: Some(detail.availability_zones.clone()),
                ..Default::default()
            },
            after: ClassicLbAttributes {
                availability_zones: Some(remaining),
                ..Default::default()
            },
        })
    }

    async fn fail_vpc_lb(
        &self,
        detail: &ClassicLbDetail,
        az: &str,
        dry_run: bool,
    ) -> AzResult<Option<ClassicLbRecord>> {
        let az_subnets = self
            .ec2
            .subnets(Some(az), &[], &detail.subnet_ids)
            .await?;
        if az_subnets.is_empty() {
            tracing::warn!(lb = %detail.name, az = %az, "Load balancer has no subnets in the target AZ, skipping");
            return Ok(None);
        }
        let az_subnet_ids: Vec<String> =
            az_subnets.iter().map(|s| s.subnet_id.clone()).collect();
        let remaining = if dry_run {
            removed(&detail.subnet_ids, &az_subnet_ids)
        } else {
            self.elb
                .detach_from_subnets(&detail.name, &az_subnet_ids)
                .await?
        };
        tracing::info!(lb = %detail.name, subnets = ?az_subnet_ids, "Detached load balancer from AZ subnets");
        Ok(Some(ClassicLbRecord {
            name: detail.name.clone(),
            before: ClassicLbAttributes {
                subnet_ids: Some(detail.subnet_ids.clone()),
                ..Default::default()
            },
            after: ClassicLbAttributes {
                subnet_ids: Some(remaining),
                ..Default::default()
            },
        }))
    }
}

#[async_trait]
impl<L, E> FaultStrategy for ElbFault<'_, L, E>
where
    L: ClassicElbApi,
    E: Ec2Api,
{
    type State = ElbState;

    fn service(&self) -> Service {
        Service::Elb
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let all = self.elb.load_balancers().await?;
        let in_az: Vec<&ClassicLbDetail> = all
            .iter()
            .filter(|lb| lb.availability_zones.iter().any(|z| z == &request.az))
            .filter(|lb| request.names.is_empty() || request.names.contains(&lb.name))
            .collect();
        let candidate_names: Vec<String> = in_az.iter().map(|lb| lb.name.clone()).collect();
        let tagged = filter_tagged(candidate_names, &request.tags, |chunk| async move {
            self.elb.tags_for(&chunk).await
        })
        .await?;
        if tagged.is_empty() {
            return Err(AzError::discovery(
                Service::Elb,
                format!("no load balancers match both the filter and AZ {}", request.az),
            ));
        }

        let default_vpc = self.ec2.default_vpc_id().await?;
        let mut records = Vec::new();
        for detail in in_az {
            if !tagged.contains(&detail.name) {
                continue;
            }
            let record = if default_vpc.as_deref() == Some(detail.vpc_id.as_str()) {
                Some(
                    self.fail_default_vpc_lb(detail, &request.az, request.dry_run)
                        .await?,
                )
            } else {
                self.fail_vpc_lb(detail, &request.az, request.dry_run)
                    .await?
            };
            records.extend(record);
        }
        if records.is_empty() {
            return Err(AzError::discovery(
                Service::Elb,
                format!("no matched load balancer had anything to fail in AZ {}", request.az),
            ));
        }
        Ok(ElbState {
            load_balancers: records,
        })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        for record in &document.state.load_balancers {
            if let (Some(before), Some(after)) =
                (&record.before.subnet_ids, &record.after.subnet_ids)
            {
                let to_attach = removed(before, after);
                if !to_attach.is_empty() {
                    tracing::info!(lb = %record.name, subnets = ?to_attach, "Re-attaching load balancer subnets");
                    self.elb.attach_to_subnets(&record.name, &to_attach).await?;
                }
            }
            if let (Some(before), Some(after)) = (
                &record.before.availability_zones,
                &record.after.availability_zones,
            ) {
                let to_enable = removed(before, after);
                if !to_enable.is_empty() {
                    tracing::info!(lb = %record.name, azs = ?to_enable, "Re-enabling load balancer AZs");
                    self.elb.enable_azs(&record.name, &to_enable).await?;
                }
            }
        }
        Ok(())
    }
}

/// Simulates the loss of one AZ for the matched classic load balancers and
/// writes the rollback state file.
pub async fn fail_az<L, E>(
    elb: &L,
    ec2: &E,
    request: &FailureRequest,
) -> AzResult<StateDocument<ElbState>>
where
    L: ClassicElbApi,
    E: Ec2Api,
{
    engine::fail_az(&ElbFault { elb, ec2 }, request).await
}

/// Restores subnet attachments and enabled AZs from the state file and
/// deletes it.
pub async fn recover_az<L, E>(elb: &L, ec2: &E, state_path: &Path) -> AzResult<bool>
where
    L: ClassicElbApi,
    E: Ec2Api,
{
    engine::recover_az(&ElbFault { elb, ec2 }, state_path).await
}
