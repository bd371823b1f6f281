use async_trait::async_trait;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

/// One managed nodegroup and the resources hanging off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodegroupDetail {
    pub name: String,
    pub asg_names: Vec<String>,
    pub subnet_ids: Vec<String>,
}

#[async_trait]
pub trait EksApi: Send + Sync {
    /// Names of clusters carrying every requested tag.
    async fn cluster_names_by_tags(&self, tags: &[Tag]) -> AzResult<Vec<String>>;

    /// Managed nodegroups of a cluster with their backing ASGs and subnets.
    async fn nodegroups(&self, cluster_name: &str) -> AzResult<Vec<NodegroupDetail>>;
}
