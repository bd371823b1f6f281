//! ELBv2 AZ failure.
//!
//! Application load balancers in the target AZ are re-homed onto the
//! complement of their subnets, dropping the target AZ. Network and gateway
//! load balancers cannot have subnets removed, so matching one fails the
//! operation instead of being silently skipped.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, AzError, AzResult, FailureRequest, FaultStrategy, Service, StateDocument,
};

use crate::api::{filter_tagged, ElbV2Api, LbKind, LbV2Detail};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Elbv2State {
    #[serde(rename = "LoadBalancers")]
    pub load_balancers: Vec<LbRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LbRecord {
    #[serde(rename = "LoadBalancerName")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: LbKind,
    #[serde(rename = "Before")]
    pub before: LbSubnets,
    #[serde(rename = "After")]
    pub after: LbSubnets,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LbSubnets {
    #[serde(rename = "SubnetIds")]
    pub subnet_ids: Vec<String>,
}

struct Elbv2Fault<'a, L> {
    elbv2: &'a L,
}

impl<L: ElbV2Api> Elbv2Fault<'_, L> {
    async fn fail_one(
        &self,
        detail: &LbV2Detail,
        az: &str,
        dry_run: bool,
    ) -> AzResult<LbRecord> {
        if detail.kind != LbKind::Application {
            return Err(AzError::unsupported(
                Service::Elbv2,
                format!(
                    "load balancer {} is not an application load balancer, subnets cannot be removed",
                    detail.name
                ),
            ));
        }
        // An ALB must keep at least two AZs, so removing one requires three.
        if detail.zones.len() < 3 {
            return Err(AzError::unsupported(
                Service::Elbv2,
                format!(
                    "load balancer {} spans {} AZs, removing one requires at least three",
                    detail.name,
                    detail.zones.len()
                ),
            ));
        }

        let before: Vec<String> = detail.zones.iter().map(|z| z.subnet_id.clone()).collect();
        let surviving: Vec<String> = detail
            .zones
            .iter()
            .filter(|z| z.zone_name != az)
            .map(|z| z.subnet_id.clone())
            .collect();
        if !dry_run {
            self.elbv2.set_subnets(&detail.arn, &surviving).await?;
        }
        tracing::info!(lb = %detail.name, az = %az, subnets = ?surviving, "Removed AZ from load balancer");
        Ok(LbRecord {
            name: detail.name.clone(),
            kind: detail.kind,
            before: LbSubnets { subnet_ids: before },
            after: LbSubnets {
                subnet_ids: surviving,
            },
        })
    }
}

#[async_trait]
impl<L: ElbV2Api> FaultStrategy for Elbv2Fault<'_, L> {
    type State = Elbv2State;

    fn service(&self) -> Service {
        Service::Elbv2
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let all = self.elbv2.load_balancers().await?;
        let in_az: Vec<&LbV2Detail> = all
            .iter()
            .filter(|lb| lb.active)
            .filter(|lb| lb.zones.iter().any(|z| z.zone_name == request.az))
            .filter(|lb| request.names.is_empty() || request.names.contains(&lb.name))
            .collect();
        if in_az.is_empty() {
            return Err(AzError::discovery(
                Service::Elbv2,
                format!("no active load balancers span AZ {}", request.az),
            ));
        }
        let arns: Vec<String> = in_az.iter().map(|lb| lb.arn.clone()).collect();
        let tagged = filter_tagged(arns, &request.tags, |chunk| async move {
            self.elbv2.tags_for(&chunk).await
        })
        .await?;
        if tagged.is_empty() {
            return Err(AzError::discovery(
                Service::Elbv2,
                format!("no load balancers match both the filter and AZ {}", request.az),
            ));
        }

        let mut records = Vec::new();
        for detail in in_az {
            if !tagged.contains(&detail.arn) {
                continue;
            }
            records.push(self.fail_one(detail, &request.az, request.dry_run).await?);
        }
        Ok(Elbv2State {
            load_balancers: records,
        })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        // ARNs are not persisted; resolve the current ARN by name.
        let arns: HashMap<String, String> = self
            .elbv2
            .load_balancers()
            .await?
            .into_iter()
            .map(|lb| (lb.name, lb.arn))
            .collect();
        for record in &document.state.load_balancers {
            let arn = arns.get(&record.name).ok_or_else(|| {
                AzError::rollback_blocked(
                    Service::Elbv2,
                    format!("load balancer {} no longer exists", record.name),
                )
            })?;
            tracing::info!(lb = %record.name, subnets = ?record.before.subnet_ids, "Restoring load balancer subnets");
            self.elbv2
                .set_subnets(arn, &record.before.subnet_ids)
                .await?;
        }
        Ok(())
    }
}

/// Simulates the loss of one AZ for the matched application load balancers
/// and writes the rollback state file.
pub async fn fail_az<L: ElbV2Api>(
    elbv2: &L,
    request: &FailureRequest,
) -> AzResult<StateDocument<Elbv2State>> {
    engine::fail_az(&Elbv2Fault { elbv2 }, request).await
}

/// Restores the recorded subnet sets from the state file and deletes it.
pub async fn recover_az<L: ElbV2Api>(elbv2: &L, state_path: &Path) -> AzResult<bool> {
    engine::recover_az(&Elbv2Fault { elbv2 }, state_path).await
}
