//! Action executor
//!
//! Carries out planned actions against the local root. Each action's outcome
//! is captured in an [`ExecutionResult`]; a failure is never propagated, so
//! one broken repository cannot block the rest of the run.

use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::git::VcsTool;
use crate::plan::{ActionKind, ReconciliationAction};

/// Outcome of one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// What happened to one repository name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub name: String,
    pub kind: ActionKind,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure(_))
    }

    /// The failure as an error value, if the action failed
    pub fn error(&self) -> Option<SyncError> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failure(reason) => Some(SyncError::ActionFailure {
                name: self.name.clone(),
                kind: self.kind,
                reason: reason.clone(),
            }),
        }
    }
}

/// Executes reconciliation actions through a [`VcsTool`] and the filesystem
pub struct ActionExecutor<V> {
    vcs: Arc<V>,
    max_parallel: usize,
}

impl<V: VcsTool + 'static> ActionExecutor<V> {
    pub fn new(vcs: V, max_parallel: usize) -> Self {
        Self {
            vcs: Arc::new(vcs),
            max_parallel: max_parallel.max(1),
        }
    }

    /// Execute a single action relative to `root`
    pub async fn execute(&self, action: &ReconciliationAction, root: &Path) -> ExecutionResult {
        execute_one(self.vcs.as_ref(), action, root).await
    }

    /// Execute every action, returning results in plan order
    ///
    /// With `max_parallel` of 1 actions run strictly one after another. With
    /// more, distinct repository names run concurrently; the planner never
    /// emits two actions for the same name.
    pub async fn execute_all(
        &self,
        actions: &[ReconciliationAction],
        root: &Path,
    ) -> Vec<ExecutionResult> {
        if self.max_parallel == 1 || actions.len() <= 1 {
            let mut results = Vec::with_capacity(actions.len());
            for action in actions {
                results.push(self.execute(action, root).await);
            }
            return results;
        }

        debug!(
            "Executing {} actions with up to {} in parallel",
            actions.len(),
            self.max_parallel
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut futures = FuturesUnordered::new();

        for (index, action) in actions.iter().enumerate() {
            let semaphore = semaphore.clone();
            let vcs = self.vcs.clone();

            futures.push(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => execute_one(vcs.as_ref(), action, root).await,
                    Err(e) => ExecutionResult {
                        name: action.name().to_string(),
                        kind: action.kind(),
                        outcome: Outcome::Failure(format!("executor shut down: {}", e)),
                    },
                };
                (index, result)
            });
        }

        let mut indexed = Vec::with_capacity(actions.len());
        while let Some(entry) = futures.next().await {
            indexed.push(entry);
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

async fn execute_one<V: VcsTool + ?Sized>(
    vcs: &V,
    action: &ReconciliationAction,
    root: &Path,
) -> ExecutionResult {
    let name = action.name();
    let kind = action.kind();

    let outcome = match repo_path(root, name) {
        Err(e) => Outcome::Failure(e.to_string()),
        Ok(path) => match action {
            ReconciliationAction::Clone { url, .. } => {
                info!("Cloning {} ({})", name, url);
                into_outcome(vcs.clone_repo(url, &path).await)
            }
            ReconciliationAction::Update { .. } => {
                info!("Updating {}", name);
                into_outcome(vcs.pull(&path).await)
            }
            ReconciliationAction::Delete { .. } => {
                info!("Removing {}", name);
                into_outcome(
                    tokio::fs::remove_dir_all(&path)
                        .await
                        .map_err(|e| format!("failed to remove {}: {}", path.display(), e)),
                )
            }
            ReconciliationAction::Skip { .. } => {
                debug!("Skipping {}", name);
                Outcome::Success
            }
        },
    };

    if let Outcome::Failure(reason) = &outcome {
        error!("{} of {} failed: {}", kind, name, reason);
    }

    ExecutionResult {
        name: name.to_string(),
        kind,
        outcome,
    }
}

fn into_outcome(result: Result<(), String>) -> Outcome {
    match result {
        Ok(()) => Outcome::Success,
        Err(reason) => Outcome::Failure(reason),
    }
}

/// Join `name` onto `root`, refusing anything but a single plain component
fn repo_path(root: &Path, name: &str) -> Result<PathBuf, SyncError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(root.join(name)),
        _ => Err(SyncError::InvalidName {
            name: name.to_string(),
        }),
    }
}
