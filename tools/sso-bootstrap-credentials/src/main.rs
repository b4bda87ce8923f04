/*!
`sso-bootstrap-credentials` signs in to AWS IAM Identity Center (SSO) with the device
authorization flow and writes a profile for every account the user can reach into
`~/.aws/credentials` and `~/.aws/config`.  The profiles refer to the SSO session; no keys are
stored.

Profile names are derived from account names; see `--prefix`, `--spelling`, and `--separator`.
Accounts offering several roles prompt for the one to use.  Existing profiles with other names
are kept, and profiles for accounts that no longer exist are not removed.
*/

mod accounts;
mod device_auth;
mod naming;
mod profiles;
mod region;
mod selection;

use accounts::{list_accounts_with_roles, SsoAccount, SsoDirectory};
use aws_sdk_sso::Client as SsoClient;
use aws_sdk_ssooidc::Client as OidcClient;
use aws_types::region::Region;
use clap::Parser;
use device_auth::{OidcTokenRequest, DEFAULT_MAX_ATTEMPTS, POLL_INTERVAL};
use log::{info, warn};
use naming::{normalize_name, Spelling};
use opskit::session::unsigned_config;
use profiles::ProfileEntry;
use selection::{pick_role, PromptChooser, RoleChooser};
use simplelog::LevelFilter;
use snafu::{OptionExt, ResultExt};
use std::process;
use tokio::runtime::Runtime;

/// Writes AWS profiles for every account reachable through an SSO start page
#[derive(Debug, Parser)]
#[command(name = "sso-bootstrap-credentials")]
struct Args {
    #[arg(global = true, long, default_value = "INFO")]
    /// How much detail to log; from least to most: ERROR, WARN, INFO, DEBUG, TRACE
    log_level: LevelFilter,

    /// SSO start page, e.g. https://example.awsapps.com/start
    #[arg(long)]
    url: String,

    /// Put this in front of every profile name, e.g. to tell organizations apart
    #[arg(long)]
    prefix: Option<String>,

    /// Letter case of profile names
    #[arg(long, value_enum, default_value_t = Spelling::Lower)]
    spelling: Spelling,

    /// Used between the words of profile names
    #[arg(long, default_value = "-")]
    separator: String,

    /// Region of the SSO instance; looked up from the start page if not given
    #[arg(long)]
    sso_region: Option<String>,

    /// Region written into each profile's config
    #[arg(long, default_value = opskit::DEFAULT_REGION)]
    default_region: String,
}

fn run() -> Result<()> {
    // Parse and store the args passed to the program
    let args = Args::parse();
    opskit::logging::init(args.log_level).context(error::LoggerSnafu)?;

    let rt = Runtime::new().context(error::RuntimeSnafu)?;
    let (sso_region, accounts) = rt.block_on(async { sign_in(&args).await })?;

    // Role prompts are interactive, so they happen outside the runtime.
    let entries = profile_entries(&args, &sso_region, &accounts, &PromptChooser)?;
    if entries.is_empty() {
        info!("No profiles to write");
        return Ok(());
    }

    let aws_dir = profiles::aws_dir().context(error::ProfilesSnafu)?;
    profiles::write_profiles(&aws_dir, &entries).context(error::ProfilesSnafu)?;
    info!("Wrote {} profiles", entries.len());
    Ok(())
}

/// Runs the device flow and lists the accounts the resulting token can reach.
async fn sign_in(args: &Args) -> Result<(String, Vec<SsoAccount>)> {
    let client_name = gethostname::gethostname().to_string_lossy().into_owned();
    info!("Client name: {}", client_name);

    let sso_region = match &args.sso_region {
        Some(region) => region.clone(),
        None => region::discover_region(&args.url)
            .await
            .context(error::RegionSnafu)?,
    };
    let config = unsigned_config(Region::new(sso_region.clone())).await;

    let oidc_client = OidcClient::new(&config);
    let registration = device_auth::register_client(&oidc_client, &client_name)
        .await
        .context(error::AuthorizeSnafu)?;
    let authorization =
        device_auth::start_device_authorization(&oidc_client, &registration, &args.url)
            .await
            .context(error::AuthorizeSnafu)?;
    device_auth::open_verification_page(&authorization);

    let request = OidcTokenRequest {
        client: &oidc_client,
        registration: &registration,
        authorization: &authorization,
    };
    let access_token = device_auth::poll_for_token(&request, DEFAULT_MAX_ATTEMPTS, POLL_INTERVAL)
        .await
        .context(error::AuthorizeSnafu)?
        .context(error::TokenTimeoutSnafu {
            attempts: DEFAULT_MAX_ATTEMPTS,
        })?;

    let directory = SsoDirectory::new(SsoClient::new(&config), access_token);
    let accounts = list_accounts_with_roles(&directory)
        .await
        .context(error::AccountsSnafu)?;
    Ok((sso_region, accounts))
}

/// One profile per account with at least one role, sorted by profile name.
fn profile_entries<C>(
    args: &Args,
    sso_region: &str,
    accounts: &[SsoAccount],
    chooser: &C,
) -> Result<Vec<ProfileEntry>>
where
    C: RoleChooser,
{
    let mut named: Vec<(String, &SsoAccount)> = accounts
        .iter()
        .map(|account| {
            let profile = normalize_name(
                &account.name,
                args.prefix.as_deref(),
                args.spelling,
                &args.separator,
            );
            (profile, account)
        })
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));

    let mut entries = Vec::with_capacity(named.len());
    for (profile, account) in named {
        let role_name = match pick_role(chooser, &profile, &account.roles)
            .context(error::SelectRoleSnafu)?
        {
            Some(role) => role,
            None => continue,
        };
        let entry = ProfileEntry {
            profile,
            start_url: args.url.clone(),
            sso_region: sso_region.to_string(),
            account_id: account.id.clone(),
            role_name,
            default_region: args.default_region.clone(),
        };

        // Sorted by name, so a collision is always with the previous entry.  The later account
        // wins, as it would when its section overwrote the earlier one in the file.
        match entries.last_mut() {
            Some(previous) if previous.profile == entry.profile => {
                warn!(
                    "Accounts {} and {} both map to profile '{}'; keeping account {}",
                    previous.account_id, entry.account_id, entry.profile, entry.account_id
                );
                *previous = entry;
            }
            _ => entries.push(entry),
        }
    }
    Ok(entries)
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
        #[snafu(display("Failed to list accounts: {}", source))]
        Accounts { source: crate::accounts::Error },

        #[snafu(display("Failed to authorize device: {}", source))]
        Authorize { source: crate::device_auth::Error },

        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: opskit::logging::Error },

        #[snafu(display("Failed to write profiles: {}", source))]
        Profiles { source: crate::profiles::Error },

        #[snafu(display("Failed to determine SSO region: {}", source))]
        Region { source: crate::region::Error },

        #[snafu(display("Failed to create async runtime: {}", source))]
        Runtime { source: std::io::Error },

        #[snafu(display("{}", source))]
        SelectRole { source: crate::selection::Error },

        #[snafu(display(
            "Device wasn't approved after {} attempts; no access token was issued",
            attempts
        ))]
        TokenTimeout { attempts: u32 },
    }
}
type Result<T> = std::result::Result<T, error::Error>;
