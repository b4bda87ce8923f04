//! The password module owns fetching each instance's encrypted password and decrypting it.

use crate::instances::InstanceRecord;
use crate::key::PasswordKey;
use async_trait::async_trait;
use aws_sdk_ec2::Client as Ec2Client;
use indicatif::ProgressBar;
use log::{debug, warn};
use snafu::ResultExt;
use tabled::Tabled;

/// Windows AMIs create this account and encrypt its password.
pub(crate) const ADMINISTRATOR: &str = "Administrator";

/// A decrypted password for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub(crate) struct PasswordRecord {
    #[tabled(rename = "Instance ID")]
    pub(crate) instance_id: String,

    #[tabled(rename = "Name")]
    pub(crate) name: String,

    #[tabled(rename = "User")]
    pub(crate) user: String,

    #[tabled(rename = "Password")]
    pub(crate) password: String,
}

/// Something that can hand back an instance's encrypted password data.
#[async_trait]
pub(crate) trait PasswordSource {
    /// Returns `None` if the instance has no password data yet.
    async fn password_data(&self, instance_id: &str) -> Result<Option<String>>;
}

/// Fetches password data with EC2's GetPasswordData.
pub(crate) struct Ec2Passwords {
    client: Ec2Client,
}

impl Ec2Passwords {
    pub(crate) fn new(client: Ec2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PasswordSource for Ec2Passwords {
    async fn password_data(&self, instance_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_password_data()
            .instance_id(instance_id)
            .send()
            .await
            .context(error::GetPasswordDataSnafu { instance_id })?;
        Ok(response
            .password_data()
            .filter(|data| !data.trim().is_empty())
            .map(str::to_string))
    }
}

/// Fetches and decrypts the password of each instance in turn, returning the records sorted by
/// instance name.  Instances without password data yet are left out with a warning.
pub(crate) async fn collect_passwords<S>(
    instances: &[InstanceRecord],
    source: &S,
    key: &PasswordKey,
    progress: Option<&ProgressBar>,
) -> Result<Vec<PasswordRecord>>
where
    S: PasswordSource + Sync,
{
    let mut records = Vec::with_capacity(instances.len());
    for instance in instances {
        debug!("Fetching password data for {}", instance.id);
        match source.password_data(&instance.id).await? {
            Some(data) => {
                let password = key.decrypt(&data).context(error::DecryptSnafu {
                    instance_id: &instance.id,
                })?;
                records.push(PasswordRecord {
                    instance_id: instance.id.clone(),
                    name: instance.name.clone(),
                    user: ADMINISTRATOR.to_string(),
                    password,
                });
            }
            None => warn!(
                "Instance {} has no password data yet; it can take a few minutes after launch",
                instance.id
            ),
        }
        if let Some(progress) = progress {
            progress.inc(1);
        }
    }

    records.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.instance_id.cmp(&b.instance_id))
    });
    Ok(records)
}

mod error {
    use aws_sdk_ec2::error::SdkError;
    use aws_sdk_ec2::operation::get_password_data::GetPasswordDataError;
    use aws_smithy_types::error::display::DisplayErrorContext;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    #[allow(clippy::large_enum_variant)]
    pub(crate) enum Error {
        #[snafu(display(
            "Failed to get password data for {}: {}",
            instance_id,
            DisplayErrorContext(source)
        ))]
        GetPasswordData {
            instance_id: String,
            source: SdkError<GetPasswordDataError>,
        },

        #[snafu(display("Failed to decrypt password for {}: {}", instance_id, source))]
        Decrypt {
            instance_id: String,
            source: crate::key::Error,
        },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
