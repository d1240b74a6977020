//! Open pull request report
//!
//! Collects the open pull requests of every repository in an organization and
//! renders them as a colored text table, CSV, HTML, JSON or Jira wiki markup.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use console::{measure_text_width, style};
use serde::Serialize;
use std::io::{self, Write};
use tracing::debug;

use crate::config::ReportConfig;
use crate::discovery::RemoteRepository;
use crate::error::{Result, SyncError};

const HEADERS: [&str; 5] = ["Repo", "Created", "Author", "Title", "Link"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One open pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PullRequestSummary {
    pub repository: String,
    pub created: DateTime<Utc>,
    pub login: String,
    pub title: String,
    #[serde(rename = "URL")]
    pub url: String,
}

/// One page of a pull request listing
#[derive(Debug, Clone, Default)]
pub struct PullRequestPage {
    pub pull_requests: Vec<PullRequestSummary>,
    pub next_page: Option<u32>,
}

/// Trait for listing the open pull requests of one repository page by page
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn list_open_pull_requests(
        &self,
        org: &str,
        repo: &str,
        page: u32,
        per_page: u8,
    ) -> Result<PullRequestPage>;
}

/// Collect every open pull request across `repos`
pub async fn collect_open_pull_requests<S>(
    source: &S,
    org: &str,
    repos: &[RemoteRepository],
    per_page: u8,
) -> Result<Vec<PullRequestSummary>>
where
    S: PullRequestSource + ?Sized,
{
    let mut all = Vec::new();

    for repo in repos {
        debug!("Analyzing repo: {}", repo.name);

        let mut page = 1u32;
        let mut found = 0usize;
        loop {
            let listing = source
                .list_open_pull_requests(org, &repo.name, page, per_page)
                .await?;
            found += listing.pull_requests.len();
            all.extend(listing.pull_requests);

            match listing.next_page {
                None => break,
                Some(next) if next <= page => {
                    return Err(SyncError::RemoteUnavailable {
                        org: org.to_string(),
                        page,
                        reason: format!(
                            "pull request listing of {} went from page {} back to page {}",
                            repo.name, page, next
                        ),
                    });
                }
                Some(next) => page = next,
            }
        }

        debug!("Number of PRs found in {}: {}", repo.name, found);
    }

    Ok(all)
}

/// Output format of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Bordered table with age-colored dates
    #[default]
    Text,
    /// Comma-separated values
    Csv,
    /// HTML table
    Html,
    /// JSON array
    Json,
    /// Jira wiki markup table
    Jira,
}

/// Age thresholds and coloring for the text table
#[derive(Debug, Clone)]
pub struct ReportStyle {
    pub warn_after: Duration,
    pub error_after: Duration,
    pub color: bool,
}

impl ReportStyle {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            warn_after: Duration::days(config.warn_after_days),
            error_after: Duration::days(config.error_after_days),
            color: config.color,
        }
    }
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

/// Render `prs` in `format` to `out`
pub fn render<W: Write>(
    prs: &[PullRequestSummary],
    format: ReportFormat,
    report_style: &ReportStyle,
    now: DateTime<Utc>,
    out: &mut W,
) -> io::Result<()> {
    match format {
        ReportFormat::Text => render_text(prs, report_style, now, out),
        ReportFormat::Csv => render_csv(prs, out),
        ReportFormat::Html => render_html(prs, out),
        ReportFormat::Json => render_json(prs, out),
        ReportFormat::Jira => render_jira(prs, out),
    }
}

fn created_date(pr: &PullRequestSummary) -> String {
    pr.created.format(DATE_FORMAT).to_string()
}

fn plain_row(pr: &PullRequestSummary) -> [String; 5] {
    [
        pr.repository.clone(),
        created_date(pr),
        pr.login.clone(),
        pr.title.clone(),
        pr.url.clone(),
    ]
}

/// Date cell colored red past the error threshold, yellow past the warning
/// threshold and green otherwise
fn colored_date(pr: &PullRequestSummary, report_style: &ReportStyle, now: DateTime<Utc>) -> String {
    let date = created_date(pr);
    if !report_style.color {
        return date;
    }

    let styled = style(date).force_styling(true);
    let styled = if pr.created < now - report_style.error_after {
        styled.red()
    } else if pr.created < now - report_style.warn_after {
        styled.yellow()
    } else {
        styled.green()
    };
    styled.to_string()
}

fn render_text<W: Write>(
    prs: &[PullRequestSummary],
    report_style: &ReportStyle,
    now: DateTime<Utc>,
    out: &mut W,
) -> io::Result<()> {
    let rows: Vec<[String; 5]> = prs
        .iter()
        .map(|pr| {
            let mut row = plain_row(pr);
            row[1] = colored_date(pr, report_style, now);
            row
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(measure_text_width(cell));
        }
    }

    let border = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{}+", border);

    let write_row = |out: &mut W, cells: &[String]| -> io::Result<()> {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| {
                let padding = width.saturating_sub(measure_text_width(cell));
                format!(" {}{} ", cell, " ".repeat(padding))
            })
            .collect::<Vec<_>>()
            .join("|");
        writeln!(out, "|{}|", line)
    };

    writeln!(out, "{}", border)?;
    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_uppercase()).collect();
    write_row(out, &headers[..])?;
    writeln!(out, "{}", border)?;
    for row in &rows {
        write_row(out, &row[..])?;
    }
    writeln!(out, "{}", border)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv<W: Write>(prs: &[PullRequestSummary], out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", HEADERS.join(","))?;
    for pr in prs {
        let row: Vec<String> = plain_row(pr).iter().map(|cell| csv_field(cell)).collect();
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn render_html<W: Write>(prs: &[PullRequestSummary], out: &mut W) -> io::Result<()> {
    writeln!(out, "<table>")?;
    let header: String = HEADERS
        .iter()
        .map(|h| format!("<th>{}</th>", h))
        .collect();
    writeln!(out, "<tr>{}</tr>", header)?;

    for pr in prs {
        let url = html_escape(&pr.url);
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td></tr>",
            html_escape(&pr.repository),
            created_date(pr),
            html_escape(&pr.login),
            html_escape(&pr.title),
            url,
            url
        )?;
    }

    writeln!(out, "</table>")
}

fn render_json<W: Write>(prs: &[PullRequestSummary], out: &mut W) -> io::Result<()> {
    serde_json::to_writer(&mut *out, prs)?;
    writeln!(out)
}

fn jira_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

fn render_jira<W: Write>(prs: &[PullRequestSummary], out: &mut W) -> io::Result<()> {
    writeln!(out, "||{}||", HEADERS.join("||"))?;
    for pr in prs {
        let row: Vec<String> = plain_row(pr).iter().map(|cell| jira_cell(cell)).collect();
        writeln!(out, "|{}|", row.join("|"))?;
    }
    Ok(())
}
