use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::params::{pulls, Direction, State};
use octocrab::Octocrab;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::{CloneProtocol, Config};
use crate::discovery::{RemoteRepository, RepositoryPage, RepositorySource};
use crate::error::SyncError;
use crate::report::{PullRequestPage, PullRequestSource, PullRequestSummary};

/// GitHub client wrapper serving repository and pull request listings
pub struct GitHubClient {
    client: Octocrab,
    protocol: CloneProtocol,
    authenticated: bool,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

impl GitHubClient {
    /// Create a new GitHub client, authenticated when a credential is available
    pub fn new(config: &Config) -> Result<Self> {
        let credential = Self::detect_authentication(config)?;

        let mut builder = Octocrab::builder();
        if let Some(api_url) = &config.github.api_url {
            builder = builder
                .base_uri(api_url.as_str())
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        let authenticated = match credential {
            Some((strategy, token)) => {
                info!("Using authentication strategy: {:?}", strategy);
                builder = builder.personal_token(token);
                true
            }
            None => {
                warn!("No GitHub credential found, using unauthenticated access (reduced rate limits)");
                false
            }
        };

        let client = builder.build().context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            protocol: config.github.clone_protocol,
            authenticated,
        })
    }

    /// Whether requests carry a credential
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Detect and obtain GitHub authentication
    ///
    /// `None` means anonymous access, which is legal.
    fn detect_authentication(config: &Config) -> Result<Option<(AuthStrategy, String)>> {
        let token_env = config.github.token_env.as_str();

        match config.github.auth_method.as_str() {
            "auto" => {
                if let Ok(token) = Self::try_environment_token(token_env) {
                    Ok(Some((AuthStrategy::EnvironmentToken, token)))
                } else if let Ok(token) = Self::try_github_cli() {
                    Ok(Some((AuthStrategy::GitHubCLI, token)))
                } else {
                    Ok(None)
                }
            }
            "token" => {
                let token = Self::try_environment_token(token_env).with_context(|| {
                    format!("{} environment variable not found or empty", token_env)
                })?;
                Ok(Some((AuthStrategy::EnvironmentToken, token)))
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok(Some((AuthStrategy::GitHubCLI, token)))
            }
            "none" => Ok(None),
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to run GitHub CLI")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "Failed to retrieve token from GitHub CLI: {}",
                String::from_utf8_lossy(&token_output.stderr)
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from environment variable
    fn try_environment_token(var: &str) -> Result<String> {
        debug!("Attempting environment variable authentication via {}", var);

        let token = env::var(var).with_context(|| format!("{} environment variable not set", var))?;

        if token.is_empty() {
            return Err(anyhow!("{} is empty", var));
        }

        Ok(token)
    }

    /// Pick the clone URL for a listed repository
    fn repo_to_remote(&self, org: &str, repo: &octocrab::models::Repository) -> RemoteRepository {
        let ssh_url = repo.ssh_url.clone();
        let https_url = repo.clone_url.as_ref().map(|u| u.to_string());

        let preferred = match self.protocol {
            CloneProtocol::Ssh => ssh_url.or(https_url),
            CloneProtocol::Https => https_url.or(ssh_url),
        };

        let clone_url = preferred
            .unwrap_or_else(|| format!("git@github.com:{}/{}.git", org, repo.name));

        RemoteRepository {
            name: repo.name.clone(),
            clone_url,
        }
    }
}

/// Page number carried by a `Link: rel="next"` URL
fn next_page_number(query: Option<&str>, current: u32) -> u32 {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
        .unwrap_or(current + 1)
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn list_repositories(
        &self,
        org: &str,
        page: u32,
        per_page: u8,
    ) -> Result<RepositoryPage, SyncError> {
        let listing = self
            .client
            .orgs(org)
            .list_repos()
            .per_page(per_page)
            .page(page)
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable {
                org: org.to_string(),
                page,
                reason: e.to_string(),
            })?;

        let repositories = listing
            .items
            .iter()
            .map(|repo| self.repo_to_remote(org, repo))
            .collect();
        let next_page = listing
            .next
            .as_ref()
            .map(|next| next_page_number(next.query(), page));

        Ok(RepositoryPage {
            repositories,
            next_page,
        })
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn list_open_pull_requests(
        &self,
        org: &str,
        repo: &str,
        page: u32,
        per_page: u8,
    ) -> Result<PullRequestPage, SyncError> {
        let listing = self
            .client
            .pulls(org, repo)
            .list()
            .state(State::Open)
            .sort(pulls::Sort::Created)
            .direction(Direction::Ascending)
            .per_page(per_page)
            .page(page)
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable {
                org: org.to_string(),
                page,
                reason: format!("listing pull requests of {}: {}", repo, e),
            })?;

        let pull_requests = listing
            .items
            .into_iter()
            .filter_map(|pr| {
                let Some(created) = pr.created_at else {
                    warn!("Pull request {} in {} has no creation date", pr.number, repo);
                    return None;
                };
                Some(PullRequestSummary {
                    repository: repo.to_string(),
                    created,
                    login: pr
                        .user
                        .map(|user| user.login)
                        .unwrap_or_else(|| "ghost".to_string()),
                    title: pr.title.unwrap_or_default(),
                    url: pr.html_url.map(|u| u.to_string()).unwrap_or(pr.url),
                })
            })
            .collect();
        let next_page = listing
            .next
            .as_ref()
            .map(|next| next_page_number(next.query(), page));

        Ok(PullRequestPage {
            pull_requests,
            next_page,
        })
    }
}
