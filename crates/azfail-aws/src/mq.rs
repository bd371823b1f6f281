//! Amazon MQ AZ failure.
//!
//! Reboots the matched ActiveMQ brokers that run in active/standby multi-AZ
//! mode and have a subnet in the target AZ, forcing a failover to the
//! standby. The reboot is one-way on the AWS side, so recovery only
//! validates and discards the state file.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use azfail_core::{
    engine, join_bounded, AzError, AzResult, FailureRequest, FaultStrategy, Service,
    StateDocument, DEFAULT_CONCURRENCY,
};

use crate::api::{BrokerDeployment, Ec2Api, MqApi};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MqState {
    #[serde(rename = "Brokers")]
    pub brokers: BrokerOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerOutcome {
    #[serde(rename = "Success")]
    pub success: BrokerIdList,
    #[serde(rename = "Failed")]
    pub failed: BrokerIdList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerIdList {
    #[serde(rename = "BrokerIds")]
    pub broker_ids: Vec<String>,
}

struct MqFault<'a, M, E> {
    mq: &'a M,
    ec2: &'a E,
}

impl<M, E> MqFault<'_, M, E>
where
    M: MqApi,
    E: Ec2Api,
{
    async fn target_brokers(&self, request: &FailureRequest) -> AzResult<Vec<String>> {
        let mut targets = Vec::new();
        for broker in self.mq.brokers().await? {
            if !(request.names.is_empty() || request.names.contains(&broker.name)) {
                continue;
            }
            let tags = self.mq.tags_for(&broker.arn).await?;
            let tagged = request
                .tags
                .iter()
                .all(|t| tags.get(&t.key).is_some_and(|v| v == &t.value));
            if !tagged {
                continue;
            }
            if !broker.engine_type.eq_ignore_ascii_case("ActiveMQ")
                || broker.deployment_mode != BrokerDeployment::ActiveStandbyMultiAz
            {
                tracing::warn!(
                    broker = %broker.name,
                    engine = %broker.engine_type,
                    "Broker is not active/standby ActiveMQ, skipping"
                );
                continue;
            }
            let subnet_ids = self.mq.broker_subnet_ids(&broker.id).await?;
            let in_az = self
                .ec2
                .subnets(Some(&request.az), &[], &subnet_ids)
                .await?;
            if in_az.is_empty() {
                continue;
            }
            targets.push(broker.id);
        }
        Ok(targets)
    }
}

#[async_trait]
impl<M, E> FaultStrategy for MqFault<'_, M, E>
where
    M: MqApi,
    E: Ec2Api,
{
    type State = MqState;

    fn service(&self) -> Service {
        Service::Mq
    }

    async fn apply(&self, request: &FailureRequest) -> AzResult<Self::State> {
        let targets = self.target_brokers(request).await?;
        if targets.is_empty() {
            return Err(AzError::discovery(
                Service::Mq,
                format!(
                    "no active/standby brokers match both the filter and AZ {}",
                    request.az
                ),
            ));
        }
        tracing::info!(brokers = ?targets, az = %request.az, "Rebooting brokers to force failover");

        if request.dry_run {
            return Ok(MqState {
                brokers: BrokerOutcome {
                    success: BrokerIdList {
                        broker_ids: targets,
                    },
                    failed: BrokerIdList::default(),
                },
            });
        }

        let outcome = join_bounded(DEFAULT_CONCURRENCY, targets, |id| async move {
            match self.mq.reboot_broker(&id).await {
                Ok(()) => Ok(id),
                Err(e) => Err((id, e)),
            }
        })
        .await;

        Ok(MqState {
            brokers: BrokerOutcome {
                success: BrokerIdList {
                    broker_ids: outcome.success,
                },
                failed: BrokerIdList {
                    broker_ids: outcome.failed,
                },
            },
        })
    }

    async fn revert(&self, document: &StateDocument<Self::State>) -> AzResult<()> {
        // The reboot already failed the broker over to its standby.
        tracing::info!(
            az = %document.availability_zone,
            "Broker reboots are self-healing, nothing to revert"
        );
        Ok(())
    }
}

/// Reboots the matched active/standby brokers and writes the rollback state
/// file.
pub async fn fail_az<M, E>(
    mq: &M,
    ec2: &E,
    request: &FailureRequest,
) -> AzResult<StateDocument<MqState>>
where
    M: MqApi,
    E: Ec2Api,
{
    engine::fail_az(&MqFault { mq, ec2 }, request).await
}

/// Validates and discards the state file; the reboot itself has no inverse
/// to apply.
pub async fn recover_az<M, E>(mq: &M, ec2: &E, state_path: &Path) -> AzResult<bool>
where
    M: MqApi,
    E: Ec2Api,
{
    engine::recover_az(&MqFault { mq, ec2 }, state_path).await
}
