//! Deletion gate between planning and execution
//!
//! A plan that deletes local repositories is only executed when it looks
//! plausible: the remote inventory is not empty and the share of local
//! directories being removed stays under the configured limit. Anything else
//! needs an explicit override.

use crate::config::SafetyConfig;
use crate::sync::SyncPlan;

/// Decision of the [`DeletionGuard`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Clear,
    Refused { reason: String },
}

#[derive(Debug, Clone)]
pub struct DeletionGuard {
    max_delete_percent: u8,
    allow_empty_remote: bool,
}

impl DeletionGuard {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            max_delete_percent: config.max_delete_percent.min(100),
            allow_empty_remote: config.allow_empty_remote,
        }
    }

    pub fn evaluate(&self, plan: &SyncPlan) -> GuardVerdict {
        let deletes = plan.deletions().count();
        if deletes == 0 {
            return GuardVerdict::Clear;
        }

        if plan.remote_count == 0 && !self.allow_empty_remote {
            return GuardVerdict::Refused {
                reason: format!(
                    "organization '{}' reports no repositories but {} local directories would be deleted",
                    plan.org, deletes
                ),
            };
        }

        let limit = plan.local_dir_count * usize::from(self.max_delete_percent) / 100;
        if deletes > limit {
            return GuardVerdict::Refused {
                reason: format!(
                    "{} of {} local directories would be deleted, above the {}% limit",
                    deletes, plan.local_dir_count, self.max_delete_percent
                ),
            };
        }

        GuardVerdict::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ReconciliationAction;
    use std::path::PathBuf;

    fn plan_with(remote_count: usize, local_dir_count: usize, deletes: usize) -> SyncPlan {
        let actions = (0..deletes)
            .map(|i| ReconciliationAction::Delete {
                name: format!("orphan{}", i),
            })
            .collect();

        SyncPlan {
            org: "acme".to_string(),
            root: PathBuf::from("/srv/mirror"),
            actions,
            remote_count,
            local_dir_count,
        }
    }

    fn guard(max_delete_percent: u8, allow_empty_remote: bool) -> DeletionGuard {
        DeletionGuard::new(&SafetyConfig {
            max_delete_percent,
            allow_empty_remote,
        })
    }

    #[test]
    fn test_no_deletes_is_clear() {
        assert_eq!(guard(0, false).evaluate(&plan_with(0, 10, 0)), GuardVerdict::Clear);
    }

    #[test]
    fn test_empty_remote_is_refused() {
        let verdict = guard(100, false).evaluate(&plan_with(0, 3, 3));
        assert!(
            matches!(verdict, GuardVerdict::Refused { ref reason } if reason.contains("no repositories"))
        );
    }

    #[test]
    fn test_empty_remote_can_be_allowed() {
        assert_eq!(guard(100, true).evaluate(&plan_with(0, 3, 3)), GuardVerdict::Clear);
    }

    #[test]
    fn test_threshold() {
        assert_eq!(guard(50, false).evaluate(&plan_with(20, 10, 5)), GuardVerdict::Clear);
        assert!(matches!(
            guard(50, false).evaluate(&plan_with(20, 10, 6)),
            GuardVerdict::Refused { .. }
        ));
        assert!(matches!(
            guard(0, false).evaluate(&plan_with(20, 10, 1)),
            GuardVerdict::Refused { .. }
        ));
    }
}
