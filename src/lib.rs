//! repoclone - Mirror a GitHub organization onto the local filesystem
//!
//! repoclone keeps a local directory in step with the repository list of an
//! organization: missing repositories are cloned, present ones are updated
//! and, on request, directories whose repository no longer exists are
//! removed. It can also report open pull requests across the organization.
//!
//! ## Modules
//!
//! - [`discovery`]: Remote inventory model and pagination
//! - [`github`]: GitHub API integration and authentication
//! - [`scanner`]: Local inventory of the mirror root
//! - [`plan`]: Pure reconciliation planner
//! - [`executor`]: Per-repository action execution
//! - [`safety`]: Deletion gate
//! - [`sync`]: Orchestration of a complete run
//! - [`report`]: Open pull request report rendering

pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod git;
pub mod github;
pub mod plan;
pub mod report;
pub mod safety;
pub mod scanner;
pub mod sync;

pub use config::Config;
pub use discovery::{RemoteRepository, RepositorySource};
pub use error::SyncError;
pub use executor::{ActionExecutor, ExecutionResult, Outcome};
pub use git::{GitCli, VcsTool};
pub use github::GitHubClient;
pub use plan::{plan, ReconciliationAction, SyncPolicy};
pub use safety::GuardVerdict;
pub use scanner::LocalEntry;
pub use sync::{SyncEngine, SyncPlan, SyncSummary};
