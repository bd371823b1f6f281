use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_mq::types::DeploymentMode;
use aws_sdk_mq::Client;

use azfail_core::{AzError, AzResult, Service};

use crate::api::{BrokerDeployment, BrokerSummaryInfo, MqApi};

pub struct MqSdk {
    client: Client,
}

impl MqSdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Mq, e)
}

#[async_trait]
impl MqApi for MqSdk {
    async fn brokers(&self) -> AzResult<Vec<BrokerSummaryInfo>> {
        let mut pages = self.client.list_brokers().into_paginator().send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for summary in page.broker_summaries() {
                let deployment_mode = match summary.deployment_mode() {
                    DeploymentMode::ActiveStandbyMultiAz => BrokerDeployment::ActiveStandbyMultiAz,
                    DeploymentMode::ClusterMultiAz => BrokerDeployment::ClusterMultiAz,
                    _ => BrokerDeployment::SingleInstance,
                };
                out.push(BrokerSummaryInfo {
                    id: summary.broker_id().unwrap_or_default().to_string(),
                    arn: summary.broker_arn().unwrap_or_default().to_string(),
                    name: summary.broker_name().unwrap_or_default().to_string(),
                    engine_type: summary.engine_type().as_str().to_string(),
                    deployment_mode,
                });
            }
        }
        Ok(out)
    }

    async fn tags_for(&self, arn: &str) -> AzResult<HashMap<String, String>> {
        let resp = self
            .client
            .list_tags()
            .resource_arn(arn)
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp.tags().cloned().unwrap_or_default())
    }

    async fn broker_subnet_ids(&self, broker_id: &str) -> AzResult<Vec<String>> {
        let resp = self
            .client
            .describe_broker()
            .broker_id(broker_id)
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp.subnet_ids().iter().map(ToString::to_string).collect())
    }

    async fn reboot_broker(&self, broker_id: &str) -> AzResult<()> {
        self.client
            .reboot_broker()
            .broker_id(broker_id)
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }
}
