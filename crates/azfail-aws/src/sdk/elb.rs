use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_elasticloadbalancing::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{ClassicElbApi, ClassicLbDetail};

pub struct ClassicElbSdk {
    client: Client,
}

impl ClassicElbSdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Elb, e)
}

#[async_trait]
impl ClassicElbApi for ClassicElbSdk {
    async fn load_balancers(&self) -> AzResult<Vec<ClassicLbDetail>> {
        let mut pages = self
            .client
            .describe_load_balancers()
            .into_paginator()
            .send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for lb in page.load_balancer_descriptions() {
                out.push(ClassicLbDetail {
                    name: lb.load_balancer_name().unwrap_or_default().to_string(),
                    availability_zones: lb
                        .availability_zones()
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    subnet_ids: lb.subnets().iter().map(ToString::to_string).collect(),
                    vpc_id: lb.vpc_id().unwrap_or_default().to_string(),
                });
            }
        }
        Ok(out)
    }

    async fn tags_for(&self, names: &[String]) -> AzResult<HashMap<String, Vec<Tag>>> {
        let resp = self
            .client
            .describe_tags()
            .set_load_balancer_names(Some(names.to_vec()))
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
                description
                    .load_balancer_name()
                    .unwrap_or_default()
                    .to_string(),
                tags,
            );
        }
        Ok(out)
    }

    async fn detach_from_subnets(
        &self,
        name: &str,
        subnet_ids: &[String],
    ) -> AzResult<Vec<String>> {
        let resp = self
            .client
            .detach_load_balancer_from_subnets()
            .load_balancer_name(name)
            .set_subnets(Some(subnet_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp.subnets().iter().map(ToString::to_string).collect())
    }

    async fn attach_to_subnets(&self, name: &str, subnet_ids: &[String]) -> AzResult<()> {
        self.client
            .attach_load_balancer_to_subnets()
            .load_balancer_name(name)
            .set_subnets(Some(subnet_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn disable_az(&self, name: &str, az: &str) -> AzResult<Vec<String>> {
        let resp = self
            .client
            .disable_availability_zones_for_load_balancer()
            .load_balancer_name(name)
            .availability_zones(az)
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp
            .availability_zones()
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    async fn enable_azs(&self, name: &str, azs: &[String]) -> AzResult<()> {
        self.client
            .enable_availability_zones_for_load_balancer()
            .load_balancer_name(name)
            .set_availability_zones(Some(azs.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }
}
