//! Common test utilities and helpers for repoclone tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use repoclone::discovery::{RemoteRepository, RepositoryPage, RepositorySource};
use repoclone::{SyncError, VcsTool};

/// Remote inventory served in fixed pages
pub struct FakeSource {
    pages: Vec<Vec<String>>,
    fail_on: Option<u32>,
}

impl FakeSource {
    pub fn single_page(names: &[&str]) -> Self {
        Self::paged(vec![names.to_vec()])
    }

    pub fn paged(pages: Vec<Vec<&str>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|page| page.into_iter().map(str::to_string).collect())
                .collect(),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.fail_on = Some(page);
        self
    }
}

pub fn clone_url(name: &str) -> String {
    format!("git@github.com:acme/{}.git", name)
}

#[async_trait]
impl RepositorySource for FakeSource {
    async fn list_repositories(
        &self,
        org: &str,
        page: u32,
        _per_page: u8,
    ) -> Result<RepositoryPage, SyncError> {
        if self.fail_on == Some(page) {
            return Err(SyncError::RemoteUnavailable {
                org: org.to_string(),
                page,
                reason: "HTTP 502 Bad Gateway".to_string(),
            });
        }

        let index = (page - 1) as usize;
        let repositories = self.pages[index]
            .iter()
            .map(|name| RemoteRepository {
                name: name.clone(),
                clone_url: clone_url(name),
            })
            .collect();

        Ok(RepositoryPage {
            repositories,
            next_page: (index + 1 < self.pages.len()).then_some(page + 1),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Version-control tool that records calls and simulates clones on disk
///
/// Clones share the call log, so a test can keep a handle after moving the
/// tool into an engine.
#[derive(Default, Clone)]
pub struct RecordingVcs {
    pub clones: Arc<Mutex<Vec<(String, PathBuf)>>>,
    pub pulls: Arc<Mutex<Vec<PathBuf>>>,
    failing: HashSet<String>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `name` fail
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    fn fails(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.failing.contains(n))
            .unwrap_or(false)
    }

    pub fn call_count(&self) -> usize {
        self.clones.lock().unwrap().len() + self.pulls.lock().unwrap().len()
    }
}

#[async_trait]
impl VcsTool for RecordingVcs {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), String> {
        self.clones
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));

        if self.fails(dest) {
            return Err("fatal: could not read from remote repository".to_string());
        }
        std::fs::create_dir_all(dest.join(".git")).map_err(|e| e.to_string())
    }

    async fn pull(&self, dir: &Path) -> Result<(), String> {
        self.pulls.lock().unwrap().push(dir.to_path_buf());

        if self.fails(dir) {
            return Err("fatal: Not possible to fast-forward, aborting.".to_string());
        }
        Ok(())
    }
}

/// Create directories named `names` under `root`
pub fn make_dirs(root: &Path, names: &[&str]) {
    for name in names {
        std::fs::create_dir_all(root.join(name)).expect("Failed to create directory");
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
