//! The repositories module owns listing the ECR repositories that pass the user's filter.

use async_trait::async_trait;
use aws_sdk_ecr::Client as EcrClient;
use log::{debug, info};
use opskit::filter::FilterSpec;
use opskit::paginate::{collect_pages, Page, PageSource};
use snafu::ResultExt;

/// Pages through DescribeRepositories, returning repository names.
pub(crate) struct RepositoryPages {
    client: EcrClient,

    /// Names to ask ECR for directly, when the filter allows it
    names: Option<Vec<String>>,
}

impl RepositoryPages {
    pub(crate) fn new(client: EcrClient, filter: &FilterSpec) -> Self {
        Self {
            client,
            names: filter.pushdown_names(),
        }
    }
}

#[async_trait]
impl PageSource for RepositoryPages {
    type Item = String;
    type Error = Error;

    async fn fetch_page(&self, next_token: Option<String>) -> Result<Page<String>> {
        debug!(
            "Describing repositories {} next token",
            if next_token.is_some() { "with" } else { "without" }
        );
        let response = self
            .client
            .describe_repositories()
            .set_repository_names(self.names.clone())
            .set_next_token(next_token)
            .send()
            .await
            .context(error::DescribeRepositoriesSnafu)?;

        let names = response
            .repositories()
            .iter()
            .filter_map(|repository| repository.repository_name())
            .map(str::to_string)
            .collect();
        Ok(Page::new(names, response.next_token().map(str::to_string)))
    }
}

/// Lists every repository name from `source` that passes `filter`.
pub(crate) async fn list_repositories<S>(
    source: &S,
    filter: &FilterSpec,
) -> std::result::Result<Vec<String>, S::Error>
where
    S: PageSource<Item = String> + Sync,
{
    info!("Listing ECR repositories");
    let repositories = collect_pages(source, |name| filter.matches(name)).await?;
    info!(
        "Found {} ECR repositories matching the filter",
        repositories.len()
    );
    Ok(repositories)
}

mod error {
    use aws_sdk_ecr::error::SdkError;
    use aws_sdk_ecr::operation::describe_repositories::DescribeRepositoriesError;
    use aws_smithy_types::error::display::DisplayErrorContext;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to describe repositories: {}", DisplayErrorContext(source)))]
        DescribeRepositories {
            source: SdkError<DescribeRepositoriesError>,
        },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
