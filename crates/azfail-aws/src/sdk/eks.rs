use async_trait::async_trait;
use aws_sdk_eks::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{EksApi, NodegroupDetail};

pub struct EksSdk {
    client: Client,
}

impl EksSdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Eks, e)
}

#[async_trait]
impl EksApi for EksSdk {
    async fn cluster_names_by_tags(&self, tags: &[Tag]) -> AzResult<Vec<String>> {
        let mut pages = self.client.list_clusters().into_paginator().send();
        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            names.extend(page.clusters().iter().cloned());
        }

        // Cluster tags only come back from DescribeCluster.
        let mut matched = Vec::new();
        for name in names {
            let resp = self
                .client
                .describe_cluster()
                .name(&name)
                .send()
                .await
                .map_err(api_err)?;
            let cluster_tags = resp.cluster().and_then(|c| c.tags());
            let all_present = tags.iter().all(|t| {
                cluster_tags
                    .and_then(|m| m.get(&t.key))
                    .is_some_and(|v| v == &t.value)
            });
            if all_present {
                matched.push(name);
            }
        }
        Ok(matched)
    }

    async fn nodegroups(&self, cluster_name: &str) -> AzResult<Vec<NodegroupDetail>> {
        let mut pages = self
            .client
            .list_nodegroups()
            .cluster_name(cluster_name)
            .into_paginator()
            .send();
        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            names.extend(page.nodegroups().iter().cloned());
        }

        let mut details = Vec::new();
        for name in names {
            let resp = self
                .client
                .describe_nodegroup()
                .cluster_name(cluster_name)
                .nodegroup_name(&name)
                .send()
                .await
                .map_err(api_err)?;
            let Some(nodegroup) = resp.nodegroup() else {
                continue;
            };
            let asg_names = nodegroup
                .resources()
                .map(|r| {
                    r.auto_scaling_groups()
                        .iter()
                        .filter_map(|g| g.name())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default();
            details.push(NodegroupDetail {
                name,
                asg_names,
                subnet_ids: nodegroup.subnets().iter().map(ToString::to_string).collect(),
            });
        }
        Ok(details)
    }
}
