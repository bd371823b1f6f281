use async_trait::async_trait;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMember {
    pub cache_cluster_id: String,
    pub cache_node_id: String,
    pub preferred_availability_zone: Option<String>,
    pub is_primary: bool,
}

/// One shard of a replication group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNodeGroup {
    pub node_group_id: String,
    pub members: Vec<CacheMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationGroupInfo {
    pub id: String,
    pub arn: String,
    pub automatic_failover_enabled: bool,
    pub node_groups: Vec<CacheNodeGroup>,
}

#[async_trait]
pub trait ElastiCacheApi: Send + Sync {
    async fn replication_groups(&self) -> AzResult<Vec<ReplicationGroupInfo>>;

    async fn tags_for(&self, arn: &str) -> AzResult<Vec<Tag>>;

    /// Requests a test failover of one node group; completion is remote and
    /// asynchronous.
    async fn test_failover(&self, replication_group_id: &str, node_group_id: &str)
        -> AzResult<()>;
}
