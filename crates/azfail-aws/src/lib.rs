//! AWS service integrations for simulating the loss of one Availability
//! Zone.
//!
//! Each service module pairs a `fail_az` entry point, which discovers the
//! tag-and-AZ-matched resources, mutates them and persists a rollback
//! snapshot, with a `recover_az` entry point that replays the snapshot in
//! reverse. The modules are written against the capability traits in
//! [`api`]; [`sdk`] supplies the real AWS clients.

pub mod api;
pub mod asg;
pub mod ec2;
pub mod eks;
pub mod elasticache;
pub mod elb;
pub mod elbv2;
pub mod mq;
pub mod rds;
pub mod sdk;

pub use azfail_core::{
    AzError, AzResult, FailureMode, FailureRequest, Service, StateDocument, Tag,
};
pub use sdk::AwsClients;
