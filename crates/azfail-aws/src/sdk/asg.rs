use std::collections::BTreeSet;

use async_trait::async_trait;
use aws_sdk_autoscaling::types::AutoScalingGroup;
use aws_sdk_autoscaling::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{tags_match, AsgDetail, AutoScalingApi};

pub struct AutoScalingSdk {
    client: Client,
}

impl AutoScalingSdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    async fn describe(&self, names: Option<Vec<String>>) -> AzResult<Vec<AutoScalingGroup>> {
        let mut pages = self
            .client
            .describe_auto_scaling_groups()
            .set_auto_scaling_group_names(names)
            .into_paginator()
            .send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            out.extend(page.auto_scaling_groups().iter().cloned());
        }
        Ok(out)
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Asg, e)
}

fn to_detail(group: &AutoScalingGroup) -> AsgDetail {
    let subnet_ids = group
        .vpc_zone_identifier()
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    let az_rebalance_suspended = group
        .suspended_processes()
        .iter()
        .any(|p| p.process_name() == Some("AZRebalance"));
    AsgDetail {
        name: group.auto_scaling_group_name().unwrap_or_default().to_string(),
        availability_zones: group
            .availability_zones()
            .iter()
            .map(ToString::to_string)
            .collect(),
        subnet_ids,
        min_size: group.min_size().unwrap_or_default(),
        max_size: group.max_size().unwrap_or_default(),
        desired_capacity: group.desired_capacity().unwrap_or_default(),
        az_rebalance_suspended,
        instance_ids: group
            .instances()
            .iter()
            .filter_map(|i| i.instance_id())
            .map(ToString::to_string)
            .collect(),
    }
}

fn group_tags(group: &AutoScalingGroup) -> Vec<Tag> {
    group
        .tags()
        .iter()
        .filter_map(|t| match (t.key(), t.value()) {
            (Some(k), Some(v)) => Some(Tag::new(k, v)),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl AutoScalingApi for AutoScalingSdk {
    async fn groups_by_names(&self, names: &[String]) -> AzResult<Vec<AsgDetail>> {
        let groups = self.describe(Some(names.to_vec())).await?;
        let found: BTreeSet<&str> = groups
            .iter()
            .filter_map(|g| g.auto_scaling_group_name())
            .collect();
        for name in names {
            if !found.contains(name.as_str()) {
                return Err(AzError::discovery(
                    Service::Asg,
                    format!("Auto Scaling group {name} not found"),
                ));
            }
        }
        Ok(groups.iter().map(to_detail).collect())
    }

    async fn group_names_by_tags(&self, tags: &[Tag]) -> AzResult<Vec<String>> {
        Ok(self
            .describe(None)
            .await?
            .iter()
            .filter(|g| tags_match(&group_tags(g), tags))
            .filter_map(|g| g.auto_scaling_group_name())
            .map(ToString::to_string)
            .collect())
    }

    async fn group_names_in_az(&self, az: &str) -> AzResult<Vec<String>> {
        Ok(self
            .describe(None)
            .await?
            .iter()
            .filter(|g| g.availability_zones().iter().any(|z| z == az))
            .filter_map(|g| g.auto_scaling_group_name())
            .map(ToString::to_string)
            .collect())
    }

    async fn set_capacity(&self, name: &str, min: i32, max: i32, desired: i32) -> AzResult<()> {
        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(name)
            .min_size(min)
            .max_size(max)
            .desired_capacity(desired)
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn set_subnets(&self, name: &str, subnet_ids: &[String]) -> AzResult<()> {
        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(name)
            .vpc_zone_identifier(subnet_ids.join(","))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn suspend_az_rebalance(&self, name: &str) -> AzResult<()> {
        self.client
            .suspend_processes()
            .auto_scaling_group_name(name)
            .scaling_processes("AZRebalance")
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn resume_az_rebalance(&self, name: &str) -> AzResult<()> {
        self.client
            .resume_processes()
            .auto_scaling_group_name(name)
            .scaling_processes("AZRebalance")
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }
}
