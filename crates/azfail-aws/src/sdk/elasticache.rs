use async_trait::async_trait;
use aws_sdk_elasticache::types::AutomaticFailoverStatus;
use aws_sdk_elasticache::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{CacheMember, CacheNodeGroup, ElastiCacheApi, ReplicationGroupInfo};

pub struct ElastiCacheSdk {
    client: Client,
}

impl ElastiCacheSdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Elasticache, e)
}

#[async_trait]
impl ElastiCacheApi for ElastiCacheSdk {
    async fn replication_groups(&self) -> AzResult<Vec<ReplicationGroupInfo>> {
        let mut pages = self
            .client
            .describe_replication_groups()
            .into_paginator()
            .send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for group in page.replication_groups() {
                let automatic_failover_enabled = matches!(
                    group.automatic_failover(),
                    Some(AutomaticFailoverStatus::Enabled)
                        | Some(AutomaticFailoverStatus::Enabling)
                );
                let node_groups = group
                    .node_groups()
                    .iter()
                    .map(|ng| CacheNodeGroup {
                        node_group_id: ng.node_group_id().unwrap_or_default().to_string(),
                        members: ng
                            .node_group_members()
                            .iter()
                            .map(|m| CacheMember {
                                cache_cluster_id: m
                                    .cache_cluster_id()
                                    .unwrap_or_default()
                                    .to_string(),
                                cache_node_id: m.cache_node_id().unwrap_or_default().to_string(),
                                preferred_availability_zone: m
                                    .preferred_availability_zone()
                                    .map(ToString::to_string),
                                is_primary: m.current_role() == Some("primary"),
                            })
                            .collect(),
                    })
                    .collect();
                out.push(ReplicationGroupInfo {
                    id: group.replication_group_id().unwrap_or_default().to_string(),
                    arn: group.arn().unwrap_or_default().to_string(),
                    automatic_failover_enabled,
                    node_groups,
                });
            }
        }
        Ok(out)
    }

    async fn tags_for(&self, arn: &str) -> AzResult<Vec<Tag>> {
        let resp = self
            .client
            .list_tags_for_resource()
            .resource_name(arn)
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp
            .tag_list()
            .iter()
            .filter_map(|t| {
                t.key()
                    .map(|k| Tag::new(k, t.value().unwrap_or_default()))
            })
            .collect())
    }

    async fn test_failover(
        &self,
        replication_group_id: &str,
        node_group_id: &str,
    ) -> AzResult<()> {
        self.client
            .test_failover()
            .replication_group_id(replication_group_id)
            .node_group_id(node_group_id)
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }
}
