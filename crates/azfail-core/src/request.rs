use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AzError, AzResult};
use crate::service::Service;

/// A key/value pair a target resource must carry to be eligible for failure.
/// All tags in a filter must match (AND semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The marker tag resources must opt into before this tool will touch
    /// them: `AZ_FAILURE=True`.
    pub fn failure_marker() -> Self {
        Self::new("AZ_FAILURE", "True")
    }
}

fn default_tags() -> Vec<Tag> {
    vec![Tag::failure_marker()]
}

/// Which flavor of EC2/EKS failure to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    Network,
    Instance,
}

/// Parameters for one `fail_az` invocation.
///
/// `az` and `dry_run` carry no serde defaults: a host config that omits
/// either fails to parse instead of silently defaulting to a real mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRequest {
    pub az: String,
    pub dry_run: bool,
    #[serde(default = "default_tags")]
    pub tags: Vec<Tag>,
    /// Explicit resource names/ids to restrict the target set to.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub failure_mode: Option<FailureMode>,
    #[serde(default = "FailureRequest::default_state_path")]
    pub state_path: PathBuf,
}

impl FailureRequest {
    pub fn new(az: impl Into<String>, dry_run: bool) -> Self {
        Self {
            az: az.into(),
            dry_run,
            tags: default_tags(),
            names: Vec::new(),
            failure_mode: None,
            state_path: Self::default_state_path(),
        }
    }

    fn default_state_path() -> PathBuf {
        PathBuf::from("fail_az")
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = Some(mode);
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Precondition checks shared by every service, run before any API call.
    pub fn validate(&self, service: Service) -> AzResult<()> {
        if self.az.trim().is_empty() {
            return Err(AzError::config(
                service,
                "To simulate AZ failure, you must specify an Availability Zone",
            ));
        }
        if self.tags.is_empty() && self.names.is_empty() {
            return Err(AzError::config(
                service,
                "To simulate AZ failure, you must provide tag filters or explicit resource names",
            ));
        }
        Ok(())
    }

    /// The failure mode, defaulting to `network` when unset.
    pub fn failure_mode_or_network(&self) -> FailureMode {
        self.failure_mode.unwrap_or(FailureMode::Network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dry_run_is_a_parse_error() {
        let err = serde_json::from_str::<FailureRequest>(r#"{"az": "ap-southeast-1a"}"#)
            .expect_err("dry_run must be mandatory");
        assert!(err.to_string().contains("dry_run"));
    }

    #[test]
    fn missing_az_is_a_parse_error() {
        assert!(serde_json::from_str::<FailureRequest>(r#"{"dry_run": true}"#).is_err());
    }

    #[test]
    fn defaults_apply_for_optional_fields() {
        let req: FailureRequest =
            serde_json::from_str(r#"{"az": "ap-southeast-1a", "dry_run": true}"#).unwrap();
        assert_eq!(req.tags, vec![Tag::failure_marker()]);
        assert!(req.names.is_empty());
        assert_eq!(req.failure_mode, None);
    }

    #[test]
    fn blank_az_fails_validation() {
        let req = FailureRequest::new("  ", true);
        assert!(req.validate(Service::Asg).is_err());
    }
}
