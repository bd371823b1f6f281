use async_trait::async_trait;
use aws_sdk_rds::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{DbClusterInfo, DbInstanceInfo, RdsApi};

pub struct RdsSdk {
    client: Client,
}

impl RdsSdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Rds, e)
}

fn map_tags(tags: &[aws_sdk_rds::types::Tag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|t| {
            t.key()
                .map(|k| Tag::new(k, t.value().unwrap_or_default()))
        })
        .collect()
}

#[async_trait]
impl RdsApi for RdsSdk {
    async fn db_instances(&self) -> AzResult<Vec<DbInstanceInfo>> {
        let mut pages = self
            .client
            .describe_db_instances()
            .into_paginator()
            .send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for db in page.db_instances() {
                out.push(DbInstanceInfo {
                    id: db.db_instance_identifier().unwrap_or_default().to_string(),
                    availability_zone: db.availability_zone().unwrap_or_default().to_string(),
                    multi_az: db.multi_az().unwrap_or_default(),
                    tags: map_tags(db.tag_list()),
                });
            }
        }
        Ok(out)
    }

    async fn db_clusters(&self) -> AzResult<Vec<DbClusterInfo>> {
        let mut pages = self.client.describe_db_clusters().into_paginator().send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for cluster in page.db_clusters() {
                let writer_instance_id = cluster
                    .db_cluster_members()
                    .iter()
                    .find(|m| m.is_cluster_writer().unwrap_or_default())
                    .and_then(|m| m.db_instance_identifier())
                    .map(ToString::to_string);
                out.push(DbClusterInfo {
                    id: cluster
                        .db_cluster_identifier()
                        .unwrap_or_default()
                        .to_string(),
                    multi_az: cluster.multi_az().unwrap_or_default(),
                    tags: map_tags(cluster.tag_list()),
                    writer_instance_id,
                });
            }
        }
        Ok(out)
    }

    async fn instance_az(&self, id: &str) -> AzResult<String> {
        let resp = self
            .client
            .describe_db_instances()
            .db_instance_identifier(id)
            .send()
            .await
            .map_err(api_err)?;
        resp.db_instances()
            .first()
            .and_then(|db| db.availability_zone())
            .map(ToString::to_string)
            .ok_or_else(|| {
                AzError::api(
                    Service::Rds,
                    anyhow::anyhow!("DB instance {id} reports no availability zone"),
                )
            })
    }

    async fn reboot_with_failover(&self, id: &str) -> AzResult<()> {
        self.client
            .reboot_db_instance()
            .db_instance_identifier(id)
            .force_failover(true)
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn failover_cluster(&self, id: &str) -> AzResult<()> {
        self.client
            .failover_db_cluster()
            .db_cluster_identifier(id)
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }
}
