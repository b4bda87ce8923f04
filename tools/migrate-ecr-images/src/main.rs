/*!
`migrate-ecr-images` audits the ECR repositories of an account ahead of a migration: it lists
the repositories that pass a name filter, describes the tagged images in each, and prints the
image count, total size, and most recent push of every repository.  Nothing is copied or
changed.

Repositories can be picked with at most one of `--repo`, `--not-repo`, `--repo-regex`, or
`--not-repo-regex`.  Images are described for up to `--threads` repositories at once.
*/

mod images;
mod repositories;
mod results;

use aws_sdk_ecr::Client as EcrClient;
use clap::Parser;
use images::{describe_repositories, EcrImages};
use log::info;
use opskit::filter::FilterSpec;
use opskit::session::{build_session, SdkSessionFactory, SessionArgs};
use repositories::{list_repositories, RepositoryPages};
use results::AuditReport;
use simplelog::LevelFilter;
use snafu::ResultExt;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::process;
use tokio::runtime::Runtime;

/// Lists ECR repositories and sizes their tagged images
#[derive(Debug, Parser)]
#[command(name = "migrate-ecr-images")]
struct Args {
    #[arg(global = true, long, default_value = "INFO")]
    /// How much detail to log; from least to most: ERROR, WARN, INFO, DEBUG, TRACE
    log_level: LevelFilter,

    /// Only audit this repository; may be repeated
    #[arg(long = "repo")]
    repos: Vec<String>,

    /// Audit every repository except this one; may be repeated
    #[arg(long = "not-repo")]
    not_repos: Vec<String>,

    /// Only audit repositories whose name matches this regular expression
    #[arg(long)]
    repo_regex: Option<String>,

    /// Audit every repository whose name doesn't match this regular expression
    #[arg(long)]
    not_repo_regex: Option<String>,

    /// How many repositories to describe at once
    #[arg(long, default_value = "50")]
    threads: NonZeroUsize,

    /// Don't display a progress bar
    #[arg(long)]
    no_progress: bool,

    #[command(flatten)]
    session: SessionArgs,
}

impl Args {
    fn filter(&self) -> std::result::Result<FilterSpec, opskit::filter::Error> {
        FilterSpec::from_flags(
            &self.repos,
            &self.not_repos,
            self.repo_regex.as_deref(),
            self.not_repo_regex.as_deref(),
        )
    }
}

fn run() -> Result<()> {
    // Parse and store the args passed to the program
    let args = Args::parse();
    opskit::logging::init(args.log_level).context(error::LoggerSnafu)?;

    // Reject bad filters before contacting AWS.
    let filter = args.filter().context(error::FilterSnafu)?;

    let rt = Runtime::new().context(error::RuntimeSnafu)?;
    let report = rt.block_on(async { audit(&args, &filter).await })?;

    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", report).context(error::WriteOutputSnafu)?;
    info!("Finished");
    Ok(())
}

async fn audit(args: &Args, filter: &FilterSpec) -> Result<AuditReport> {
    let session = build_session(&SdkSessionFactory, &args.session)
        .await
        .context(error::SessionSnafu)?;
    let ecr_client = EcrClient::new(session.sdk_config());

    let repositories = list_repositories(&RepositoryPages::new(ecr_client.clone(), filter), filter)
        .await
        .context(error::RepositoriesSnafu)?;
    if repositories.is_empty() {
        info!("No repositories to audit");
        return Ok(AuditReport::default());
    }

    let progress = opskit::progress::build(
        args.no_progress,
        repositories.len() as u64,
        "Describing repositories",
    )
    .context(error::ProgressSnafu)?;
    let described = describe_repositories(
        &EcrImages::new(ecr_client),
        &repositories,
        args.threads,
        progress.as_ref(),
    )
    .await
    .context(error::ImagesSnafu)?;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    Ok(AuditReport::new(&described))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Invalid repository filter: {}", source))]
        Filter { source: opskit::filter::Error },

        #[snafu(display("Failed to describe images: {}", source))]
        Images { source: crate::images::Error },

        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: opskit::logging::Error },

        #[snafu(display("Failed to set up progress bar: {}", source))]
        Progress { source: opskit::progress::Error },

        #[snafu(display("Failed to list repositories: {}", source))]
        Repositories { source: crate::repositories::Error },

        #[snafu(display("Failed to create async runtime: {}", source))]
        Runtime { source: std::io::Error },

        #[snafu(display("Failed to create AWS session: {}", source))]
        Session { source: opskit::session::Error },

        #[snafu(display("Failed to write output: {}", source))]
        WriteOutput { source: std::io::Error },
    }
}
type Result<T> = std::result::Result<T, error::Error>;
