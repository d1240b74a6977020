//! Sync Engine - Orchestrates one reconciliation run
//!
//! A run fetches the remote inventory and scans the local root, plans the
//! actions that converge the two, passes destructive actions through the
//! deletion gate and finally executes the plan. Nothing is mutated until the
//! complete remote inventory has been observed.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::discovery::{fetch_inventory, RepositorySource};
use crate::error::{Result, SyncError};
use crate::executor::{ActionExecutor, ExecutionResult, Outcome};
use crate::git::{GitCli, VcsTool};
use crate::github::GitHubClient;
use crate::plan::{plan_with_exclusions, ActionKind, ExcludePatterns, ReconciliationAction, SyncPolicy};
use crate::safety::{DeletionGuard, GuardVerdict};
use crate::scanner::scan;

/// The complete decision for one run, computed before anything is executed
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub org: String,
    pub root: PathBuf,
    pub actions: Vec<ReconciliationAction>,

    /// Number of repositories in the remote inventory
    pub remote_count: usize,

    /// Number of directories found under the root
    pub local_dir_count: usize,
}

impl SyncPlan {
    pub fn deletions(&self) -> impl Iterator<Item = &ReconciliationAction> {
        self.actions.iter().filter(|a| a.is_delete())
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
    pub results: Vec<ExecutionResult>,
}

impl SyncSummary {
    fn compile(results: Vec<ExecutionResult>, duration: Duration) -> Self {
        let mut successful = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for result in &results {
            match (&result.outcome, result.kind) {
                (Outcome::Failure(_), _) => failed += 1,
                (Outcome::Success, ActionKind::Skip) => skipped += 1,
                (Outcome::Success, _) => successful += 1,
            }
        }

        Self {
            total: results.len(),
            successful,
            failed,
            skipped,
            duration,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Every failed action as an error value
    pub fn failures(&self) -> Vec<SyncError> {
        self.results.iter().filter_map(ExecutionResult::error).collect()
    }
}

/// The main sync engine that orchestrates repository synchronization
pub struct SyncEngine<S, V> {
    source: S,
    executor: ActionExecutor<V>,
    guard: DeletionGuard,
    excluded: ExcludePatterns,
    per_page: u8,
}

impl SyncEngine<GitHubClient, GitCli> {
    /// Engine talking to GitHub and the git executable
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = GitHubClient::new(config).context("Failed to create GitHub client")?;
        Ok(Self::new(config, client, GitCli::new(config)))
    }
}

impl<S, V> SyncEngine<S, V>
where
    S: RepositorySource,
    V: VcsTool + 'static,
{
    pub fn new(config: &Config, source: S, vcs: V) -> Self {
        Self {
            source,
            executor: ActionExecutor::new(vcs, config.sync.max_parallel),
            guard: DeletionGuard::new(&config.safety),
            excluded: config.exclude_patterns(),
            per_page: config.github.per_page,
        }
    }

    /// Fetch, scan and plan without mutating anything
    pub async fn prepare(&self, org: &str, root: &Path, policy: &SyncPolicy) -> Result<SyncPlan> {
        info!("Planning synchronization of {} into {}", org, root.display());

        let (remote, local) = tokio::try_join!(
            fetch_inventory(&self.source, org, self.per_page),
            scan(root)
        )?;

        let actions = plan_with_exclusions(&remote, &local, policy, &self.excluded);
        let plan = SyncPlan {
            org: org.to_string(),
            root: root.to_path_buf(),
            actions,
            remote_count: remote.len(),
            local_dir_count: local.iter().filter(|e| e.is_dir).count(),
        };

        info!(
            "Planned {} clones, {} updates, {} deletions, {} skips",
            plan.count(ActionKind::Clone),
            plan.count(ActionKind::Update),
            plan.count(ActionKind::Delete),
            plan.count(ActionKind::Skip)
        );

        Ok(plan)
    }

    /// What the deletion gate says about `plan`, without acting on it
    pub fn deletion_verdict(&self, plan: &SyncPlan) -> GuardVerdict {
        self.guard.evaluate(plan)
    }

    /// Gate planned deletions; `force` overrides a refusal
    pub fn check_deletions(&self, plan: &SyncPlan, force: bool) -> Result<()> {
        match self.deletion_verdict(plan) {
            GuardVerdict::Clear => Ok(()),
            GuardVerdict::Refused { reason } if force => {
                warn!("Deletion gate overridden: {}", reason);
                Ok(())
            }
            GuardVerdict::Refused { reason } => Err(SyncError::DeletionRefused { reason }),
        }
    }

    /// Execute every planned action, collecting per-repository outcomes
    pub async fn execute(&self, plan: &SyncPlan) -> SyncSummary {
        let start_time = Instant::now();

        let results = self.executor.execute_all(&plan.actions, &plan.root).await;
        let summary = SyncSummary::compile(results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} successful, {} failed, {} skipped",
            summary.duration.as_secs_f64(),
            summary.successful,
            summary.failed,
            summary.skipped
        );

        summary
    }

    /// Run a complete reconciliation: plan, gate deletions, execute
    pub async fn run(
        &self,
        org: &str,
        root: &Path,
        policy: &SyncPolicy,
        force: bool,
    ) -> Result<SyncSummary> {
        let plan = self.prepare(org, root, policy).await?;
        self.check_deletions(&plan, force)?;
        Ok(self.execute(&plan).await)
    }
}
