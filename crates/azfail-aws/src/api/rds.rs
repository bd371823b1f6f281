use async_trait::async_trait;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInstanceInfo {
    pub id: String,
    pub availability_zone: String,
    pub multi_az: bool,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbClusterInfo {
    pub id: String,
    pub multi_az: bool,
    pub tags: Vec<Tag>,
    /// The member currently holding the writer role, if the API reports one.
    pub writer_instance_id: Option<String>,
}

#[async_trait]
pub trait RdsApi: Send + Sync {
    async fn db_instances(&self) -> AzResult<Vec<DbInstanceInfo>>;

    async fn db_clusters(&self) -> AzResult<Vec<DbClusterInfo>>;

    /// Current AZ of one DB instance, used to confirm a cluster writer's
    /// placement.
    async fn instance_az(&self, id: &str) -> AzResult<String>;

    async fn reboot_with_failover(&self, id: &str) -> AzResult<()>;

    async fn failover_cluster(&self, id: &str) -> AzResult<()>;
}
