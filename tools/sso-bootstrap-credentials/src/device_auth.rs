//! The device_auth module owns the SSO-OIDC device authorization flow: registering this host as
//! a client, asking the user to approve it in a browser, and polling until an access token is
//! issued.

use async_trait::async_trait;
use aws_sdk_ssooidc::Client as OidcClient;
use log::{debug, info, warn};
use snafu::{OptionExt, ResultExt};
use std::time::Duration;

/// How many times to ask for the token before giving up.
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 300;

/// How long to wait between token requests.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

const CLIENT_TYPE: &str = "public";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// The client credentials SSO-OIDC issued to this host.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) client_id: String,
    client_secret: String,
}

/// A pending device authorization, waiting for the user to approve it.
#[derive(Debug, Clone)]
pub(crate) struct DeviceAuthorization {
    device_code: String,
    pub(crate) verification_uri_complete: String,
}

/// Registers a public client named `client_name`.
pub(crate) async fn register_client(client: &OidcClient, client_name: &str) -> Result<Registration> {
    info!("Registering client '{}'", client_name);
    let response = client
        .register_client()
        .client_name(client_name)
        .client_type(CLIENT_TYPE)
        .send()
        .await
        .context(error::RegisterClientSnafu)?;

    Ok(Registration {
        client_id: response
            .client_id()
            .context(error::MissingFieldSnafu {
                operation: "RegisterClient",
                field: "clientId",
            })?
            .to_string(),
        client_secret: response
            .client_secret()
            .context(error::MissingFieldSnafu {
                operation: "RegisterClient",
                field: "clientSecret",
            })?
            .to_string(),
    })
}

/// Starts device authorization against the SSO start page at `start_url`.
pub(crate) async fn start_device_authorization(
    client: &OidcClient,
    registration: &Registration,
    start_url: &str,
) -> Result<DeviceAuthorization> {
    info!("Starting device authorization");
    let response = client
        .start_device_authorization()
        .client_id(&registration.client_id)
        .client_secret(&registration.client_secret)
        .start_url(start_url)
        .send()
        .await
        .context(error::StartDeviceAuthorizationSnafu)?;

    Ok(DeviceAuthorization {
        device_code: response
            .device_code()
            .context(error::MissingFieldSnafu {
                operation: "StartDeviceAuthorization",
                field: "deviceCode",
            })?
            .to_string(),
        verification_uri_complete: response
            .verification_uri_complete()
            .context(error::MissingFieldSnafu {
                operation: "StartDeviceAuthorization",
                field: "verificationUriComplete",
            })?
            .to_string(),
    })
}

/// Opens the approval page in the user's browser.  The link is logged too, for hosts without
/// one (WSL, SSH sessions), so failing to open it is only a warning.
pub(crate) fn open_verification_page(authorization: &DeviceAuthorization) {
    let url = &authorization.verification_uri_complete;
    info!(
        "Approve this device in your browser; if it doesn't open, visit: {}",
        url
    );
    if let Err(e) = webbrowser::open(url) {
        warn!("Unable to open a browser: {}", e);
    }
}

/// Something that can be asked, repeatedly, for the access token of an authorization.
#[async_trait]
pub(crate) trait TokenRequest {
    /// Returns `None` while the user hasn't approved the device yet.
    async fn try_token(&self) -> Result<Option<String>>;
}

/// Requests tokens with SSO-OIDC's CreateToken.
pub(crate) struct OidcTokenRequest<'a> {
    pub(crate) client: &'a OidcClient,
    pub(crate) registration: &'a Registration,
    pub(crate) authorization: &'a DeviceAuthorization,
}

#[async_trait]
impl<'a> TokenRequest for OidcTokenRequest<'a> {
    async fn try_token(&self) -> Result<Option<String>> {
        let result = self
            .client
            .create_token()
            .client_id(&self.registration.client_id)
            .client_secret(&self.registration.client_secret)
            .grant_type(DEVICE_CODE_GRANT)
            .device_code(&self.authorization.device_code)
            .send()
            .await;

        match result {
            Ok(response) => Ok(Some(
                response
                    .access_token()
                    .context(error::MissingFieldSnafu {
                        operation: "CreateToken",
                        field: "accessToken",
                    })?
                    .to_string(),
            )),
            Err(e) => match e.as_service_error() {
                Some(service)
                    if service.is_authorization_pending_exception()
                        || service.is_slow_down_exception() =>
                {
                    Ok(None)
                }
                _ => Err(e).context(error::CreateTokenSnafu),
            },
        }
    }
}

/// Polling stops once a token arrived or the attempts ran out, whichever comes first.
pub(crate) fn should_stop(attempts: u32, ceiling: u32, token: &Option<String>) -> bool {
    attempts >= ceiling || token.is_some()
}

/// Asks `request` for the token up to `ceiling` times, `interval` apart.  Returns `None` if the
/// user never approved the device; any error other than "not approved yet" ends polling.
pub(crate) async fn poll_for_token<R>(
    request: &R,
    ceiling: u32,
    interval: Duration,
) -> Result<Option<String>>
where
    R: TokenRequest + Sync,
{
    let mut attempts = 0;
    let mut token = None;
    while !should_stop(attempts, ceiling, &token) {
        token = request.try_token().await?;
        attempts += 1;
        if token.is_none() && attempts < ceiling {
            debug!("Device not approved yet, attempt {} of {}", attempts, ceiling);
            tokio::time::sleep(interval).await;
        }
    }

    match token {
        Some(_) => info!("Access token issued after {} attempts", attempts),
        None => warn!("No access token after {} attempts", attempts),
    }
    Ok(token)
}

mod error {
    use aws_sdk_ssooidc::error::SdkError;
    use aws_sdk_ssooidc::operation::create_token::CreateTokenError;
    use aws_sdk_ssooidc::operation::register_client::RegisterClientError;
    use aws_sdk_ssooidc::operation::start_device_authorization::StartDeviceAuthorizationError;
    use aws_smithy_types::error::display::DisplayErrorContext;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    #[allow(clippy::large_enum_variant)]
    pub(crate) enum Error {
        #[snafu(display("Failed to create token: {}", DisplayErrorContext(source)))]
        CreateToken { source: SdkError<CreateTokenError> },

        #[snafu(display("{} response is missing {}", operation, field))]
        MissingField {
            operation: &'static str,
            field: &'static str,
        },

        #[snafu(display("Failed to register client: {}", DisplayErrorContext(source)))]
        RegisterClient {
            source: SdkError<RegisterClientError>,
        },

        #[snafu(display(
            "Failed to start device authorization: {}",
            DisplayErrorContext(source)
        ))]
        StartDeviceAuthorization {
            source: SdkError<StartDeviceAuthorizationError>,
        },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
