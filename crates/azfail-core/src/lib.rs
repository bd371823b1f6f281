//! Service-agnostic engine for simulating the loss of an AWS Availability
//! Zone and rolling the simulation back from a persisted snapshot.
//!
//! Service integrations live in `azfail-aws`; this crate owns the pieces
//! that are identical across all of them: the failure request model, the
//! error taxonomy, the state-file codec and lock, the generic
//! discover → plan → mutate → snapshot → persist engine, and the bounded
//! fan-out used for independent per-resource mutations.

pub mod engine;
pub mod error;
pub mod fanout;
pub mod request;
pub mod service;
pub mod statefile;

pub use engine::{fail_az, recover_az, FaultStrategy, StateDocument};
pub use error::{AzError, AzResult};
pub use fanout::{join_bounded, BatchOutcome, DEFAULT_CONCURRENCY};
pub use request::{FailureMode, FailureRequest, Tag};
pub use service::Service;
