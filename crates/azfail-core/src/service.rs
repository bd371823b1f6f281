use serde::{Deserialize, Serialize};
use std::fmt;

/// The AWS resource types this extension can fail over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Asg,
    Ec2,
    Eks,
    Elb,
    Elbv2,
    Rds,
    Elasticache,
    Mq,
}

impl Service {
    /// Lowercase token used in the `<base>.<service>.json` file suffix.
    pub fn file_token(&self) -> &'static str {
        match self {
            Self::Asg => "asg",
            Self::Ec2 => "ec2",
            Self::Eks => "eks",
            Self::Elb => "elb",
            Self::Elbv2 => "elbv2",
            Self::Rds => "rds",
            Self::Elasticache => "elasticache",
            Self::Mq => "mq",
        }
    }

    /// Uppercase tag used as the log/error prefix, e.g. `[ASG]`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Asg => "ASG",
            Self::Ec2 => "EC2",
            Self::Eks => "EKS",
            Self::Elb => "ELB",
            Self::Elbv2 => "ELBV2",
            Self::Rds => "RDS",
            Self::Elasticache => "ELASTICACHE",
            Self::Mq => "MQ",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
