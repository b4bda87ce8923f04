//! The session module owns turning command-line credentials into a usable AWS SDK config.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_types::SdkConfig;
use clap::Args;
use log::{info, warn};
use snafu::OptionExt;
use std::fmt;

/// Credential and region options shared by every tool.
#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// Named profile to load credentials from; takes precedence over explicit keys
    #[arg(long, env = "AWS_PROFILE")]
    pub profile_name: Option<String>,

    /// Access key ID, used when no profile is given
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key: Option<String>,

    /// Secret access key, used when no profile is given
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Region to send requests to
    #[arg(
        long,
        visible_alias = "region-name",
        env = "AWS_REGION",
        default_value = crate::DEFAULT_REGION
    )]
    pub region: String,
}

/// Where the session's credentials come from.  Exactly one source is used per run.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A profile from the shared config and credentials files
    Profile(String),

    /// An explicit key pair, optionally with a session token
    StaticKeys {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
}

// Keep secrets out of debug logging.
impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            Self::StaticKeys {
                access_key_id,
                session_token,
                ..
            } => f
                .debug_struct("StaticKeys")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .field("session_token", &session_token.as_ref().map(|_| "** redacted **"))
                .finish(),
        }
    }
}

impl CredentialSource {
    /// Picks the credential source.  A profile wins over explicit keys (which are then ignored,
    /// with a warning); without a profile, both halves of the key pair are required.  Empty
    /// values count as absent.
    pub fn resolve(
        profile: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        session_token: Option<&str>,
    ) -> Result<Self> {
        let profile = present(profile);
        let access_key = present(access_key);
        let secret_key = present(secret_key);
        let session_token = present(session_token);

        if let Some(profile) = profile {
            if access_key.is_some() || secret_key.is_some() || session_token.is_some() {
                warn!(
                    "Profile '{}' was given, so the access key, secret key and session token will be ignored",
                    profile
                );
            }
            return Ok(Self::Profile(profile.to_string()));
        }

        let access_key_id = access_key.context(error::MissingCredentialsSnafu {
            missing: "access key",
        })?;
        let secret_access_key = secret_key.context(error::MissingCredentialsSnafu {
            missing: "secret key",
        })?;
        Ok(Self::StaticKeys {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
        })
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// An authenticated handle to AWS, bound to one region.  Building it makes no network calls;
/// credentials are resolved when the first request is signed.
#[derive(Debug, Clone)]
pub struct Session {
    config: SdkConfig,
}

impl Session {
    pub fn new(config: SdkConfig) -> Self {
        Self { config }
    }

    /// The config to build service clients from, e.g. `aws_sdk_ec2::Client::new(session.sdk_config())`.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> Option<&str> {
        self.config.region().map(|r| r.as_ref())
    }
}

/// Builds sessions from a resolved credential source.
#[async_trait]
pub trait SessionFactory {
    type Session: Send;

    async fn create(&self, source: CredentialSource, region: Region) -> Self::Session;
}

/// Builds sessions with the AWS SDK's config loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkSessionFactory;

#[async_trait]
impl SessionFactory for SdkSessionFactory {
    type Session = Session;

    async fn create(&self, source: CredentialSource, region: Region) -> Session {
        let loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        let loader = match source {
            CredentialSource::Profile(name) => loader.profile_name(name),
            CredentialSource::StaticKeys {
                access_key_id,
                secret_access_key,
                session_token,
            } => loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token,
                None,
                "opskit-static",
            )),
        };
        Session::new(loader.load().await)
    }
}

/// Config for services that authenticate with their own tokens rather than signed requests,
/// like SSO-OIDC and the SSO portal.
pub async fn unsigned_config(region: Region) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .no_credentials()
        .load()
        .await
}

/// Resolves the credential source from `args` and hands it to `factory`.  Fails before the
/// factory is called if the arguments don't name usable credentials.
pub async fn build_session<F>(factory: &F, args: &SessionArgs) -> Result<F::Session>
where
    F: SessionFactory + Sync,
{
    info!("Validating credentials to create a session in {}", args.region);
    let source = CredentialSource::resolve(
        args.profile_name.as_deref(),
        args.access_key.as_deref(),
        args.secret_key.as_deref(),
        args.session_token.as_deref(),
    )?;
    match &source {
        CredentialSource::Profile(name) => info!("Creating session with profile '{}'", name),
        CredentialSource::StaticKeys { .. } => info!("Creating session with access key"),
    }
    let session = factory
        .create(source, Region::new(args.region.clone()))
        .await;
    info!("Session created");
    Ok(session)
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display(
            "No profile name was given, so an access key and secret key are required; missing {}",
            missing
        ))]
        MissingCredentials { missing: String },
    }
}
pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::{build_session, CredentialSource, Error, SessionArgs, SessionFactory};
    use async_trait::async_trait;
    use aws_types::region::Region;
    use std::sync::Mutex;

    /// Records what it was asked to build instead of building anything.
    #[derive(Default)]
    struct RecordingFactory {
        calls: Mutex<Vec<(CredentialSource, String)>>,
    }

    #[async_trait]
    impl SessionFactory for RecordingFactory {
        type Session = CredentialSource;

        async fn create(&self, source: CredentialSource, region: Region) -> CredentialSource {
            self.calls
                .lock()
                .unwrap()
                .push((source.clone(), region.as_ref().to_string()));
            source
        }
    }

    fn args(
        profile: Option<&str>,
        access: Option<&str>,
        secret: Option<&str>,
        token: Option<&str>,
    ) -> SessionArgs {
        SessionArgs {
            profile_name: profile.map(str::to_string),
            access_key: access.map(str::to_string),
            secret_key: secret.map(str::to_string),
            session_token: token.map(str::to_string),
            region: "eu-west-1".to_string(),
        }
    }

    #[tokio::test]
    async fn profile_wins_over_keys() {
        let factory = RecordingFactory::default();
        let session = build_session(
            &factory,
            &args(Some("ops"), Some("AKIA"), Some("secret"), Some("token")),
        )
        .await
        .unwrap();

        assert_eq!(session, CredentialSource::Profile("ops".to_string()));
        let calls = factory.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(
                CredentialSource::Profile("ops".to_string()),
                "eu-west-1".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn keys_without_profile() {
        let factory = RecordingFactory::default();
        let session = build_session(&factory, &args(None, Some("AKIA"), Some("secret"), None))
            .await
            .unwrap();
        assert_eq!(
            session,
            CredentialSource::StaticKeys {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: None,
            }
        );
    }

    #[tokio::test]
    async fn missing_credentials_never_reach_factory() {
        let factory = RecordingFactory::default();
        let result = build_session(&factory, &args(None, None, None, Some("token"))).await;
        assert!(matches!(result, Err(Error::MissingCredentials { .. })));
        assert!(factory.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn half_a_key_pair_is_rejected() {
        let result = CredentialSource::resolve(None, Some("AKIA"), None, None);
        assert!(matches!(result, Err(Error::MissingCredentials { missing }) if missing == "secret key"));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let result = CredentialSource::resolve(Some(""), Some("AKIA"), Some("secret"), Some(" "));
        assert_eq!(
            result.unwrap(),
            CredentialSource::StaticKeys {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: None,
            }
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let source = CredentialSource::StaticKeys {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: Some("also-secret".to_string()),
        };
        let rendered = format!("{:?}", source);
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
