//! The instances module owns finding the EC2 instances whose passwords were asked for.

use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, Instance, InstanceStateName, PlatformValues};
use aws_sdk_ec2::Client as Ec2Client;
use log::{info, trace};
use opskit::paginate::{collect_pages, Page, PageSource};
use snafu::ResultExt;

/// Which instances to describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InstanceSelector {
    /// Exactly these instance IDs
    Ids(Vec<String>),

    /// Every instance launched with this key pair
    KeyName(String),
}

/// The parts of an EC2 instance description we need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstanceRecord {
    pub(crate) id: String,

    /// Value of the `Name` tag, empty if the instance has none
    pub(crate) name: String,

    pub(crate) windows: bool,

    /// Lifecycle state, e.g. "running" or "stopped"
    pub(crate) state: String,
}

impl From<&Instance> for InstanceRecord {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.instance_id().unwrap_or_default().to_string(),
            name: instance
                .tags()
                .iter()
                .find(|tag| tag.key() == Some("Name"))
                .and_then(|tag| tag.value())
                .unwrap_or_default()
                .to_string(),
            windows: instance.platform() == Some(&PlatformValues::Windows),
            state: instance
                .state()
                .and_then(|state| state.name())
                .map(|name| name.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Why an instance can't have its password fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SkipReason {
    NotWindows,
    NotRunning(String),
}

impl InstanceRecord {
    pub(crate) fn skip_reason(&self) -> Option<SkipReason> {
        if !self.windows {
            Some(SkipReason::NotWindows)
        } else if self.state != InstanceStateName::Running.as_str() {
            Some(SkipReason::NotRunning(self.state.clone()))
        } else {
            None
        }
    }
}

/// Keeps the running Windows instances, logging why each other instance is left out.
pub(crate) fn eligible(instances: Vec<InstanceRecord>) -> Vec<InstanceRecord> {
    instances
        .into_iter()
        .filter(|instance| match instance.skip_reason() {
            None => true,
            Some(SkipReason::NotWindows) => {
                info!(
                    "Instance {} isn't running Windows; it will be ignored",
                    instance.id
                );
                false
            }
            Some(SkipReason::NotRunning(state)) => {
                info!(
                    "Instance {} is {}, not running; it will be ignored",
                    instance.id, state
                );
                false
            }
        })
        .collect()
}

/// Pages through DescribeInstances for the selected instances.
pub(crate) struct InstancePages {
    client: Ec2Client,
    selector: InstanceSelector,
}

impl InstancePages {
    pub(crate) fn new(client: Ec2Client, selector: InstanceSelector) -> Self {
        Self { client, selector }
    }
}

#[async_trait]
impl PageSource for InstancePages {
    type Item = InstanceRecord;
    type Error = Error;

    async fn fetch_page(&self, next_token: Option<String>) -> Result<Page<InstanceRecord>> {
        let request = self.client.describe_instances().set_next_token(next_token);
        let request = match &self.selector {
            InstanceSelector::Ids(ids) => request.set_instance_ids(Some(ids.clone())),
            InstanceSelector::KeyName(key_name) => request.filters(
                Filter::builder()
                    .name("key-name")
                    .values(key_name.clone())
                    .build(),
            ),
        };
        let response = request.send().await.context(error::DescribeInstancesSnafu)?;

        let instances: Vec<InstanceRecord> = response
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .map(InstanceRecord::from)
            .collect();
        trace!("Described {} instances", instances.len());
        Ok(Page::new(instances, response.next_token().map(str::to_string)))
    }
}

/// Describes every selected instance.
pub(crate) async fn list_instances(
    client: Ec2Client,
    selector: InstanceSelector,
) -> Result<Vec<InstanceRecord>> {
    match &selector {
        InstanceSelector::Ids(ids) => info!("Describing instances {}", ids.join(", ")),
        InstanceSelector::KeyName(key_name) => {
            info!("Listing instances launched with key pair '{}'", key_name)
        }
    }
    let instances = collect_pages(&InstancePages::new(client, selector), |_| true).await?;
    info!("Found {} instances", instances.len());
    Ok(instances)
}

mod error {
    use aws_sdk_ec2::error::SdkError;
    use aws_sdk_ec2::operation::describe_instances::DescribeInstancesError;
    use aws_smithy_types::error::display::DisplayErrorContext;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    #[allow(clippy::large_enum_variant)]
    pub(crate) enum Error {
        #[snafu(display("Failed to describe instances: {}", DisplayErrorContext(source)))]
        DescribeInstances {
            source: SdkError<DescribeInstancesError>,
        },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::{eligible, InstanceRecord, SkipReason};
    use aws_sdk_ec2::types::{Instance, InstanceState, InstanceStateName, PlatformValues, Tag};

    fn record(id: &str, windows: bool, state: &str) -> InstanceRecord {
        InstanceRecord {
            id: id.to_string(),
            name: format!("{}-name", id),
            windows,
            state: state.to_string(),
        }
    }

    #[test]
    fn record_from_sdk_instance() {
        let instance = Instance::builder()
            .instance_id("i-0123")
            .platform(PlatformValues::Windows)
            .state(InstanceState::builder().name(InstanceStateName::Running).build())
            .tags(Tag::builder().key("team").value("ops").build())
            .tags(Tag::builder().key("Name").value("web-1").build())
            .build();

        assert_eq!(
            InstanceRecord::from(&instance),
            InstanceRecord {
                id: "i-0123".to_string(),
                name: "web-1".to_string(),
                windows: true,
                state: "running".to_string(),
            }
        );
    }

    #[test]
    fn untagged_linux_instance() {
        let instance = Instance::builder()
            .instance_id("i-0456")
            .state(InstanceState::builder().name(InstanceStateName::Stopped).build())
            .build();
        let record = InstanceRecord::from(&instance);
        assert_eq!(record.name, "");
        assert_eq!(record.skip_reason(), Some(SkipReason::NotWindows));
    }

    #[test]
    fn only_running_windows_instances_are_eligible() {
        let instances = vec![
            record("i-1", true, "running"),
            record("i-2", true, "stopped"),
            record("i-3", false, "running"),
            record("i-4", true, "running"),
        ];
        let kept: Vec<String> = eligible(instances).into_iter().map(|i| i.id).collect();
        assert_eq!(kept, vec!["i-1", "i-4"]);
    }

    #[test]
    fn stopped_instance_reason_names_state() {
        assert_eq!(
            record("i-2", true, "stopped").skip_reason(),
            Some(SkipReason::NotRunning("stopped".to_string()))
        );
    }
}
