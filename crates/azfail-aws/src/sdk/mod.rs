//! AWS SDK implementations of the capability traits in [`crate::api`].
//!
//! Each wrapper owns one SDK client and translates between the SDK's shapes
//! and the plain structs the service modules consume. All wrappers share
//! one resolved `SdkConfig`.

use aws_config::{BehaviorVersion, SdkConfig};

pub mod asg;
pub mod ec2;
pub mod eks;
pub mod elasticache;
pub mod elb;
pub mod elbv2;
pub mod mq;
pub mod rds;

pub use asg::AutoScalingSdk;
pub use ec2::Ec2Sdk;
pub use eks::EksSdk;
pub use elasticache::ElastiCacheSdk;
pub use elb::ClassicElbSdk;
pub use elbv2::ElbV2Sdk;
pub use mq::MqSdk;
pub use rds::RdsSdk;

/// One client per integrated service, built from a single shared config.
pub struct AwsClients {
    pub ec2: Ec2Sdk,
    pub autoscaling: AutoScalingSdk,
    pub eks: EksSdk,
    pub elb: ClassicElbSdk,
    pub elbv2: ElbV2Sdk,
    pub rds: RdsSdk,
    pub elasticache: ElastiCacheSdk,
    pub mq: MqSdk,
}

impl AwsClients {
    /// Resolves credentials and region from the ambient environment.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::from_config(&config)
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            ec2: Ec2Sdk::new(config),
            autoscaling: AutoScalingSdk::new(config),
            eks: EksSdk::new(config),
            elb: ClassicElbSdk::new(config),
            elbv2: ElbV2Sdk::new(config),
            rds: RdsSdk::new(config),
            elasticache: ElastiCacheSdk::new(config),
            mq: MqSdk::new(config),
        }
    }
}
