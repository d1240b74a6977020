//! Reconciliation planner
//!
//! Compares the remote inventory with the local snapshot and decides, per
//! repository name, whether to clone, update, delete or leave it alone. The
//! planner performs no I/O; everything it needs is passed in.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use crate::discovery::RemoteRepository;
use crate::scanner::LocalEntry;

/// Which reconciliation steps are enabled for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Create local copies of remote repositories absent locally
    pub clone: bool,

    /// Refresh local copies that are already present
    pub update: bool,

    /// Delete local directories with no corresponding remote repository
    pub remove: bool,
}

/// A single planned step for one repository name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationAction {
    Clone { name: String, url: String },
    Update { name: String },
    Delete { name: String },
    Skip { name: String },
}

/// Field-less discriminant of [`ReconciliationAction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Clone,
    Update,
    Delete,
    Skip,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Clone => "clone",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Skip => "skip",
        };
        f.write_str(label)
    }
}

impl ReconciliationAction {
    pub fn name(&self) -> &str {
        match self {
            Self::Clone { name, .. }
            | Self::Update { name }
            | Self::Delete { name }
            | Self::Skip { name } => name,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Clone { .. } => ActionKind::Clone,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
            Self::Skip { .. } => ActionKind::Skip,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

impl fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone { name, url } => write!(f, "clone {} ({})", name, url),
            other => write!(f, "{} {}", other.kind(), other.name()),
        }
    }
}

/// Repository names that are known remotely but must never be touched
///
/// Patterns are exact names or simple `*` globs.
#[derive(Debug, Clone, Default)]
pub struct ExcludePatterns {
    patterns: Vec<Regex>,
}

impl ExcludePatterns {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pattern| {
                let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
                match Regex::new(&format!("^{}$", escaped.join(".*"))) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e);
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

/// Plan the reconciliation of `remote` against `local`
pub fn plan(
    remote: &[RemoteRepository],
    local: &[LocalEntry],
    policy: &SyncPolicy,
) -> Vec<ReconciliationAction> {
    plan_with_exclusions(remote, local, policy, &ExcludePatterns::default())
}

/// Plan the reconciliation, leaving repositories matching `excluded` alone
///
/// Every remote repository yields exactly one of Clone, Update or Skip, and
/// every local-only directory yields exactly one of Delete or Skip. All
/// remote-derived actions come before any local-only action.
///
/// A remote name with any local entry is present: it is updated when the
/// entry resolves to a directory (symbolic links included) and skipped
/// otherwise. Clone only ever targets a free path.
pub fn plan_with_exclusions(
    remote: &[RemoteRepository],
    local: &[LocalEntry],
    policy: &SyncPolicy,
    excluded: &ExcludePatterns,
) -> Vec<ReconciliationAction> {
    let local_by_name: HashMap<&str, &LocalEntry> = local
        .iter()
        .map(|entry| (entry.name.as_str(), entry))
        .collect();

    let mut remote_names: HashSet<&str> = HashSet::with_capacity(remote.len());
    let mut actions = Vec::with_capacity(remote.len() + local.len());

    for repo in remote {
        if !remote_names.insert(repo.name.as_str()) {
            warn!("Remote inventory lists '{}' more than once", repo.name);
            continue;
        }

        let name = repo.name.clone();
        let action = if excluded.matches(&repo.name) {
            debug!("Skipping {} as it matches an exclude pattern", repo.name);
            ReconciliationAction::Skip { name }
        } else if let Some(entry) = local_by_name.get(repo.name.as_str()) {
            if !entry.resolves_to_dir {
                warn!(
                    "Skipping {}: the local path exists but is not a directory",
                    repo.name
                );
                ReconciliationAction::Skip { name }
            } else if policy.update {
                ReconciliationAction::Update { name }
            } else {
                ReconciliationAction::Skip { name }
            }
        } else if policy.clone {
            ReconciliationAction::Clone {
                name,
                url: repo.clone_url.clone(),
            }
        } else {
            ReconciliationAction::Skip { name }
        };

        actions.push(action);
    }

    for entry in local {
        if !entry.is_dir {
            debug!("Skipping {} as it is not a directory", entry.name);
            continue;
        }
        if remote_names.contains(entry.name.as_str()) {
            continue;
        }

        let name = entry.name.clone();
        if policy.remove {
            actions.push(ReconciliationAction::Delete { name });
        } else {
            actions.push(ReconciliationAction::Skip { name });
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    fn remote(name: &str, url: &str) -> RemoteRepository {
        RemoteRepository {
            name: name.to_string(),
            clone_url: url.to_string(),
        }
    }

    fn dir(name: &str) -> LocalEntry {
        LocalEntry::directory(name)
    }

    fn file(name: &str) -> LocalEntry {
        LocalEntry::other(name)
    }

    fn linked_dir(name: &str) -> LocalEntry {
        LocalEntry {
            name: name.to_string(),
            is_dir: false,
            resolves_to_dir: true,
        }
    }

    fn policy(clone: bool, update: bool, remove: bool) -> SyncPolicy {
        SyncPolicy {
            clone,
            update,
            remove,
        }
    }

    #[test]
    fn test_missing_repo_is_cloned() {
        let actions = plan(&[remote("x", "git@x")], &[], &policy(true, false, false));
        assert_eq!(
            actions,
            vec![ReconciliationAction::Clone {
                name: "x".to_string(),
                url: "git@x".to_string()
            }]
        );
    }

    #[test]
    fn test_present_repo_is_updated() {
        let actions = plan(&[remote("x", "git@x")], &[dir("x")], &policy(false, true, false));
        assert_eq!(
            actions,
            vec![ReconciliationAction::Update {
                name: "x".to_string()
            }]
        );
    }

    #[test]
    fn test_orphan_is_deleted_when_remote_is_empty() {
        let actions = plan(&[], &[dir("orphan")], &policy(false, false, true));
        assert_eq!(
            actions,
            vec![ReconciliationAction::Delete {
                name: "orphan".to_string()
            }]
        );
    }

    #[test]
    fn test_update_precedes_delete() {
        let actions = plan(
            &[remote("x", "git@x")],
            &[dir("orphan"), dir("x")],
            &policy(false, true, true),
        );
        assert_eq!(
            actions,
            vec![
                ReconciliationAction::Update {
                    name: "x".to_string()
                },
                ReconciliationAction::Delete {
                    name: "orphan".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_disabled_policy_skips_everything() {
        let actions = plan(
            &[remote("x", "git@x"), remote("y", "git@y")],
            &[dir("x"), dir("orphan")],
            &SyncPolicy::default(),
        );
        assert!(actions
            .iter()
            .all(|a| a.kind() == ActionKind::Skip));
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn test_non_directories_never_produce_actions() {
        let actions = plan(
            &[],
            &[file("README.md"), file("link-to-elsewhere")],
            &policy(true, true, true),
        );
        assert!(actions.is_empty());
    }

    #[test]
    fn test_file_occupying_a_remote_name_is_skipped() {
        let actions = plan(&[remote("x", "git@x")], &[file("x")], &policy(true, true, true));
        assert_eq!(
            actions,
            vec![ReconciliationAction::Skip {
                name: "x".to_string()
            }]
        );
    }

    #[test]
    fn test_symlinked_repo_is_updated_not_cloned() {
        let actions = plan(
            &[remote("x", "git@x")],
            &[linked_dir("x")],
            &policy(true, true, true),
        );
        assert_eq!(
            actions,
            vec![ReconciliationAction::Update {
                name: "x".to_string()
            }]
        );

        let actions = plan(
            &[remote("x", "git@x")],
            &[linked_dir("x")],
            &policy(true, false, true),
        );
        assert_eq!(actions[0].kind(), ActionKind::Skip);
    }

    #[test]
    fn test_symlinked_orphan_is_never_deleted() {
        let actions = plan(&[], &[linked_dir("elsewhere")], &policy(true, true, true));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_excluded_repo_is_skipped_and_protected() {
        let excluded = ExcludePatterns::new(&["legacy-*".to_string()]);
        let actions = plan_with_exclusions(
            &[remote("legacy-api", "git@legacy"), remote("core", "git@core")],
            &[dir("legacy-api")],
            &policy(true, true, true),
            &excluded,
        );

        assert_eq!(
            actions,
            vec![
                ReconciliationAction::Skip {
                    name: "legacy-api".to_string()
                },
                ReconciliationAction::Clone {
                    name: "core".to_string(),
                    url: "git@core".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_exclude_pattern_matching() {
        let excluded = ExcludePatterns::new(&[
            "archived-*".to_string(),
            "*.github.io".to_string(),
            "exact".to_string(),
        ]);

        assert!(excluded.matches("archived-site"));
        assert!(excluded.matches("acme.github.io"));
        assert!(excluded.matches("exact"));
        assert!(!excluded.matches("exactly"));
        assert!(!excluded.matches("acme-github-io"));
    }

    #[test]
    fn test_duplicate_remote_names_keep_first() {
        let actions = plan(
            &[remote("x", "git@first"), remote("x", "git@second")],
            &[],
            &policy(true, false, false),
        );
        assert_eq!(
            actions,
            vec![ReconciliationAction::Clone {
                name: "x".to_string(),
                url: "git@first".to_string()
            }]
        );
    }

    #[test]
    fn test_rename_clones_new_name_and_deletes_old() {
        let actions = plan(
            &[remote("new-name", "git@new")],
            &[dir("old-name")],
            &policy(true, true, true),
        );
        assert_eq!(actions[0].kind(), ActionKind::Clone);
        assert_eq!(actions[1].kind(), ActionKind::Delete);
        assert_eq!(actions[1].name(), "old-name");
    }

    #[test]
    fn test_action_display() {
        let clone = ReconciliationAction::Clone {
            name: "x".to_string(),
            url: "git@x".to_string(),
        };
        let delete = ReconciliationAction::Delete {
            name: "y".to_string(),
        };
        assert_eq!(clone.to_string(), "clone x (git@x)");
        assert_eq!(delete.to_string(), "delete y");
    }

    // Property checks over arbitrary inventories

    fn build_inputs(
        remote_names: &[u8],
        local_names: &[(u8, bool)],
    ) -> (Vec<RemoteRepository>, Vec<LocalEntry>) {
        let remote: Vec<_> = remote_names
            .iter()
            .map(|n| n % 16)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|n| remote(&format!("repo{}", n), &format!("git@host:repo{}.git", n)))
            .collect();

        let mut seen = BTreeSet::new();
        let local = local_names
            .iter()
            .filter(|(n, _)| seen.insert(n % 16))
            .map(|(n, is_dir)| {
                let name = format!("repo{}", n % 16);
                if *is_dir {
                    LocalEntry::directory(&name)
                } else {
                    LocalEntry::other(&name)
                }
            })
            .collect();

        (remote, local)
    }

    #[quickcheck]
    fn prop_shared_names_are_never_deleted(
        remote_names: Vec<u8>,
        local_names: Vec<(u8, bool)>,
        flags: (bool, bool, bool),
    ) -> bool {
        let (remote, local) = build_inputs(&remote_names, &local_names);
        let remote_set: HashSet<_> = remote.iter().map(|r| r.name.clone()).collect();
        let actions = plan(&remote, &local, &policy(flags.0, flags.1, flags.2));

        actions
            .iter()
            .filter(|a| a.is_delete())
            .all(|a| !remote_set.contains(a.name()))
    }

    #[quickcheck]
    fn prop_every_name_planned_exactly_once(
        remote_names: Vec<u8>,
        local_names: Vec<(u8, bool)>,
        flags: (bool, bool, bool),
    ) -> bool {
        let (remote, local) = build_inputs(&remote_names, &local_names);
        let actions = plan(&remote, &local, &policy(flags.0, flags.1, flags.2));

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for action in &actions {
            *counts.entry(action.name()).or_default() += 1;
        }

        let remote_ok = remote.iter().all(|r| {
            counts.get(r.name.as_str()) == Some(&1)
                && actions.iter().any(|a| {
                    a.name() == r.name
                        && matches!(
                            a.kind(),
                            ActionKind::Clone | ActionKind::Update | ActionKind::Skip
                        )
                })
        });

        let local_only_ok = local
            .iter()
            .filter(|e| e.is_dir && !remote.iter().any(|r| r.name == e.name))
            .all(|e| {
                counts.get(e.name.as_str()) == Some(&1)
                    && actions.iter().any(|a| {
                        a.name() == e.name
                            && matches!(a.kind(), ActionKind::Delete | ActionKind::Skip)
                    })
            });

        remote_ok && local_only_ok && counts.len() == actions.len()
    }

    #[quickcheck]
    fn prop_deletes_come_last(
        remote_names: Vec<u8>,
        local_names: Vec<(u8, bool)>,
        flags: (bool, bool, bool),
    ) -> bool {
        let (remote, local) = build_inputs(&remote_names, &local_names);
        let actions = plan(&remote, &local, &policy(flags.0, flags.1, flags.2));

        match actions.iter().position(|a| a.is_delete()) {
            Some(first_delete) => actions[first_delete..]
                .iter()
                .all(|a| matches!(a.kind(), ActionKind::Delete | ActionKind::Skip)),
            None => true,
        }
    }

    #[quickcheck]
    fn prop_never_clones_onto_an_occupied_path(
        remote_names: Vec<u8>,
        local_names: Vec<(u8, bool)>,
        flags: (bool, bool, bool),
    ) -> bool {
        let (remote, local) = build_inputs(&remote_names, &local_names);
        let occupied: HashSet<_> = local.iter().map(|e| e.name.as_str()).collect();
        let actions = plan(&remote, &local, &policy(flags.0, flags.1, flags.2));

        actions
            .iter()
            .filter(|a| a.kind() == ActionKind::Clone)
            .all(|a| !occupied.contains(a.name()))
    }

    #[quickcheck]
    fn prop_plan_is_deterministic(remote_names: Vec<u8>, local_names: Vec<(u8, bool)>) -> bool {
        let (remote, local) = build_inputs(&remote_names, &local_names);
        let policy = policy(true, true, true);
        plan(&remote, &local, &policy) == plan(&remote, &local, &policy)
    }
}
