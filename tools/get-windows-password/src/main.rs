/*!
`get-windows-password` retrieves the initial Administrator password of running Windows EC2
instances and prints it in a table.

EC2 encrypts the password with the public half of the key pair the instance was launched with;
give the private half with `--pem-file`.  Without `--instance-id`, every instance launched with
that key pair is considered (the key pair name is the PEM file name up to its first dot).
Instances that aren't Windows, or aren't running, are skipped.

Credentials come from a named profile, or from an explicit access key and secret key; each
option also falls back to the standard AWS environment variable.
*/

mod instances;
mod key;
mod password;
mod results;

use aws_sdk_ec2::Client as Ec2Client;
use clap::Parser;
use instances::{eligible, list_instances, InstanceSelector};
use key::PasswordKey;
use log::info;
use opskit::session::{build_session, SdkSessionFactory, SessionArgs};
use password::{collect_passwords, Ec2Passwords};
use results::PasswordReport;
use simplelog::LevelFilter;
use snafu::{OptionExt, ResultExt};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tokio::runtime::Runtime;

/// Retrieves and decrypts the Administrator password of Windows EC2 instances
#[derive(Debug, Parser)]
#[command(name = "get-windows-password")]
struct Args {
    #[arg(global = true, long, default_value = "INFO")]
    /// How much detail to log; from least to most: ERROR, WARN, INFO, DEBUG, TRACE
    log_level: LevelFilter,

    /// Private key of the key pair the instances were launched with
    #[arg(long)]
    pem_file: PathBuf,

    /// Instance to fetch the password of; may be repeated.  Defaults to every instance launched
    /// with the PEM file's key pair
    #[arg(long = "instance-id")]
    instance_ids: Vec<String>,

    /// Don't display a progress bar
    #[arg(long)]
    no_progress: bool,

    #[command(flatten)]
    session: SessionArgs,
}

fn run() -> Result<()> {
    // Parse and store the args passed to the program
    let args = Args::parse();
    opskit::logging::init(args.log_level).context(error::LoggerSnafu)?;

    let rt = Runtime::new().context(error::RuntimeSnafu)?;
    let report = rt.block_on(async { fetch_passwords(&args).await })?;

    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", report).context(error::WriteOutputSnafu)?;
    info!("Finished");
    Ok(())
}

async fn fetch_passwords(args: &Args) -> Result<PasswordReport> {
    // Load the key first so a bad key fails before we talk to AWS.
    info!("Loading private key from {}", args.pem_file.display());
    let key = PasswordKey::from_path(&args.pem_file).context(error::KeySnafu)?;

    let session = build_session(&SdkSessionFactory, &args.session)
        .await
        .context(error::SessionSnafu)?;
    let ec2_client = Ec2Client::new(session.sdk_config());

    let selector = if args.instance_ids.is_empty() {
        InstanceSelector::KeyName(key_pair_name(&args.pem_file).context(
            error::KeyPairNameSnafu {
                path: &args.pem_file,
            },
        )?)
    } else {
        InstanceSelector::Ids(args.instance_ids.clone())
    };
    let instances = list_instances(ec2_client.clone(), selector)
        .await
        .context(error::InstancesSnafu)?;

    let instances = eligible(instances);
    if instances.is_empty() {
        info!("None of the requested instances are running Windows");
        return Ok(PasswordReport::default());
    }

    let progress = opskit::progress::build(
        args.no_progress,
        instances.len() as u64,
        "Collecting passwords",
    )
    .context(error::ProgressSnafu)?;
    let records = collect_passwords(
        &instances,
        &Ec2Passwords::new(ec2_client),
        &key,
        progress.as_ref(),
    )
    .await
    .context(error::PasswordSnafu)?;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    info!("Collected {} passwords", records.len());
    Ok(PasswordReport::new(records))
}

/// The key pair name EC2 knows the PEM file by: its file name up to the first dot.
fn key_pair_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let name = file_name.split('.').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Failed to list instances: {}", source))]
        Instances { source: crate::instances::Error },

        #[snafu(display("Failed to load private key: {}", source))]
        Key { source: crate::key::Error },

        #[snafu(display("Can't derive a key pair name from '{}'", path.display()))]
        KeyPairName { path: PathBuf },

        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: opskit::logging::Error },

        #[snafu(display("Failed to collect passwords: {}", source))]
        Password { source: crate::password::Error },

        #[snafu(display("Failed to set up progress bar: {}", source))]
        Progress { source: opskit::progress::Error },

        #[snafu(display("Failed to create async runtime: {}", source))]
        Runtime { source: std::io::Error },

        #[snafu(display("Failed to create AWS session: {}", source))]
        Session { source: opskit::session::Error },

        #[snafu(display("Failed to write output: {}", source))]
        WriteOutput { source: std::io::Error },
    }
}
type Result<T> = std::result::Result<T, error::Error>;
