pub mod artifacts;
pub mod auditor;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod mover;
pub mod planner;
pub mod progress;
pub mod resolver;
pub mod scanner;
pub mod sidecar;
pub mod stats;
pub mod verify;

pub use config::AppConfig;
pub use engine::{PairingResult, PairingStats, Pipeline, RunResult, ScanResult};
pub use error::Error;
pub use merge::{MergeConflict, MergePolicy};
pub use planner::{Plan, PlanEntry, Planner};
pub use progress::{ProgressReporter, SilentReporter};
pub use resolver::{ResolverConfig, SidecarResolver};
pub use sidecar::SidecarDocument;
