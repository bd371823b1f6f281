use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{LoadBalancerStateEnum, LoadBalancerTypeEnum};
use aws_sdk_elasticloadbalancingv2::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{ElbV2Api, LbKind, LbV2Detail, LbZone};

pub struct ElbV2Sdk {
    client: Client,
}

impl ElbV2Sdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Elbv2, e)
}

#[async_trait]
impl ElbV2Api for ElbV2Sdk {
    async fn load_balancers(&self) -> AzResult<Vec<LbV2Detail>> {
        let mut pages = self
            .client
            .describe_load_balancers()
            .into_paginator()
            .send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for lb in page.load_balancers() {
                let kind = match lb.r#type() {
                    Some(LoadBalancerTypeEnum::Application) => LbKind::Application,
                    Some(LoadBalancerTypeEnum::Network) => LbKind::Network,
                    _ => LbKind::Gateway,
                };
                let zones = lb
                    .availability_zones()
                    .iter()
                    .filter_map(|z| match (z.zone_name(), z.subnet_id()) {
                        (Some(zone), Some(subnet)) => Some(LbZone {
                            zone_name: zone.to_string(),
                            subnet_id: subnet.to_string(),
                        }),
                        _ => None,
                    })
                    .collect();
                let active = lb
                    .state()
                    .and_then(|s| s.code())
                    .is_some_and(|c| *c == LoadBalancerStateEnum::Active);
                out.push(LbV2Detail {
                    name: lb.load_balancer_name().unwrap_or_default().to_string(),
                    arn: lb.load_balancer_arn().unwrap_or_default().to_string(),
                    kind,
                    zones,
                    active,
                });
            }
        }
        Ok(out)
    }

    async fn tags_for(&self, arns: &[String]) -> AzResult<HashMap<String, Vec<Tag>>> {
        let resp = self
            .client
            .describe_tags()
            .set_resource_arns(Some(arns.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        let mut out = HashMap::new();
        for description in resp.tag_descriptions() {
            let tags = description
                .tags()
                .iter()
                .filter_map(|t| {
                    t.key()
                        .map(|k| Tag::new(k, t.value().unwrap_or_default()))
                })
                .collect();
            out.insert(
                description.resource_arn().unwrap_or_default().to_string(),
                tags,
            );
        }
        Ok(out)
    }

    async fn set_subnets(&self, arn: &str, subnet_ids: &[String]) -> AzResult<()> {
        self.client
            .set_subnets()
            .load_balancer_arn(arn)
            .set_subnets(Some(subnet_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }
}
