//! The results module owns summarizing repositories and reporting the totals.

use crate::images::RepositoryImages;
use chrono::{DateTime, Utc};
use std::fmt::{self, Display};
use tabled::{Style, Table, Tabled};

const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Image count and size of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepositorySummary {
    pub(crate) repository: String,
    pub(crate) image_count: usize,
    pub(crate) total_bytes: u64,
    pub(crate) last_pushed: Option<DateTime<Utc>>,
}

impl From<&RepositoryImages> for RepositorySummary {
    fn from(repository: &RepositoryImages) -> Self {
        Self {
            repository: repository.repository.clone(),
            image_count: repository.images.len(),
            total_bytes: repository.images.iter().map(|i| i.size_bytes).sum(),
            last_pushed: repository.images.iter().filter_map(|i| i.pushed_at).max(),
        }
    }
}

/// Sums over every summarized repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Totals {
    pub(crate) repositories: usize,
    pub(crate) images: usize,
    pub(crate) bytes: u64,
}

/// The summaries of one run, sorted by repository name, and their totals.
#[derive(Debug, Default)]
pub(crate) struct AuditReport {
    pub(crate) summaries: Vec<RepositorySummary>,
    pub(crate) totals: Totals,
}

impl AuditReport {
    /// Summarizes each repository; the input order doesn't matter.
    pub(crate) fn new(repositories: &[RepositoryImages]) -> Self {
        let mut summaries: Vec<RepositorySummary> =
            repositories.iter().map(RepositorySummary::from).collect();
        summaries.sort_by(|a, b| a.repository.cmp(&b.repository));

        let totals = Totals {
            repositories: summaries.len(),
            images: summaries.iter().map(|s| s.image_count).sum(),
            bytes: summaries.iter().map(|s| s.total_bytes).sum(),
        };
        Self { summaries, totals }
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Repository")]
    repository: String,

    #[tabled(rename = "Images")]
    images: usize,

    #[tabled(rename = "Size")]
    size: String,

    #[tabled(rename = "Last push")]
    last_pushed: String,
}

impl From<&RepositorySummary> for Row {
    fn from(summary: &RepositorySummary) -> Self {
        Self {
            repository: summary.repository.clone(),
            images: summary.image_count,
            size: format_size(summary.total_bytes),
            last_pushed: summary
                .last_pushed
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

impl Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows: Vec<Row> = self.summaries.iter().map(Row::from).collect();
        rows.push(Row {
            repository: format!("TOTAL ({} repositories)", self.totals.repositories),
            images: self.totals.images,
            size: format_size(self.totals.bytes),
            last_pushed: String::new(),
        });
        writeln!(f, "{}", Table::new(rows).with(Style::modern()))
    }
}

/// Formats a byte count with binary units, e.g. "1.50 GiB".
pub(crate) fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
