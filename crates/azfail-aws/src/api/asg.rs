use async_trait::async_trait;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

/// Everything the planner needs to know about one Auto Scaling group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsgDetail {
    pub name: String,
    pub availability_zones: Vec<String>,
    /// Parsed from `VPCZoneIdentifier`.
    pub subnet_ids: Vec<String>,
    pub min_size: i32,
    pub max_size: i32,
    pub desired_capacity: i32,
    pub az_rebalance_suspended: bool,
    pub instance_ids: Vec<String>,
}

#[async_trait]
pub trait AutoScalingApi: Send + Sync {
    /// Describe the named groups; any name the API does not know is an
    /// error (a referenced-by-name resource that is missing must fail the
    /// operation, not shrink the target set).
    async fn groups_by_names(&self, names: &[String]) -> AzResult<Vec<AsgDetail>>;

    /// Names of groups carrying every requested tag.
    async fn group_names_by_tags(&self, tags: &[Tag]) -> AzResult<Vec<String>>;

    /// Names of groups whose AZ list contains the target AZ.
    async fn group_names_in_az(&self, az: &str) -> AzResult<Vec<String>>;

    async fn set_capacity(&self, name: &str, min: i32, max: i32, desired: i32) -> AzResult<()>;

    async fn set_subnets(&self, name: &str, subnet_ids: &[String]) -> AzResult<()>;

    async fn suspend_az_rebalance(&self, name: &str) -> AzResult<()>;

    async fn resume_az_rebalance(&self, name: &str) -> AzResult<()>;
}
