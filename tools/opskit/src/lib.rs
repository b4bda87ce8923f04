/*!
`opskit` holds the pieces shared by the AWS operations tools in this workspace.

* `session`: turns a profile name or an explicit key pair into an `SdkConfig` for one region
* `filter`: the item filter chosen once from the command line
* `paginate`: drains a continuation-token API page by page, filtering as it goes
* `fanout`: runs independent per-item requests with a bounded number in flight
* `logging`: the simplelog setup every tool uses
* `progress`: the progress bar shown while per-item work runs
*/

pub mod fanout;
pub mod filter;
pub mod logging;
pub mod paginate;
pub mod progress;
pub mod session;

/// Region used when neither the command line nor the environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";
