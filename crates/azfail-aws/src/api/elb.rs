use async_trait::async_trait;
use std::collections::HashMap;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicLbDetail {
    pub name: String,
    pub availability_zones: Vec<String>,
    pub subnet_ids: Vec<String>,
    pub vpc_id: String,
}

#[async_trait]
pub trait ClassicElbApi: Send + Sync {
    async fn load_balancers(&self) -> AzResult<Vec<ClassicLbDetail>>;

    /// Tags per LB name. Callers pass at most
    /// [`super::DESCRIBE_TAGS_CHUNK`] names per call; the locator owns
    /// batching.
    async fn tags_for(&self, names: &[String]) -> AzResult<HashMap<String, Vec<Tag>>>;

    /// Detaches the LB from the given subnets, returning the remaining
    /// attached subnets.
    async fn detach_from_subnets(&self, name: &str, subnet_ids: &[String])
        -> AzResult<Vec<String>>;

    async fn attach_to_subnets(&self, name: &str, subnet_ids: &[String]) -> AzResult<()>;

    /// Disables one AZ for the LB, returning the remaining enabled AZs.
    async fn disable_az(&self, name: &str, az: &str) -> AzResult<Vec<String>>;

    async fn enable_azs(&self, name: &str, azs: &[String]) -> AzResult<()>;
}
