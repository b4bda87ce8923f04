//! The images module owns describing the tagged images in each repository, in parallel.

use async_trait::async_trait;
use aws_sdk_ecr::types::{DescribeImagesFilter, ImageDetail, TagStatus};
use aws_sdk_ecr::Client as EcrClient;
use chrono::{DateTime, TimeZone, Utc};
use indicatif::ProgressBar;
use log::{debug, info};
use opskit::fanout::fan_out;
use opskit::paginate::{collect_pages, Page, PageSource};
use snafu::ResultExt;
use std::num::NonZeroUsize;

/// The parts of an ECR image description we report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageRecord {
    pub(crate) digest: String,

    /// Tags pointing at the image; may be empty
    pub(crate) tags: Vec<String>,

    pub(crate) pushed_at: Option<DateTime<Utc>>,

    pub(crate) size_bytes: u64,
}

impl From<&ImageDetail> for ImageRecord {
    fn from(detail: &ImageDetail) -> Self {
        Self {
            digest: detail.image_digest().unwrap_or_default().to_string(),
            tags: detail.image_tags().to_vec(),
            pushed_at: detail
                .image_pushed_at()
                .and_then(|at| Utc.timestamp_opt(at.secs(), at.subsec_nanos()).single()),
            size_bytes: detail
                .image_size_in_bytes()
                .and_then(|size| u64::try_from(size).ok())
                .unwrap_or_default(),
        }
    }
}

/// The images found in one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepositoryImages {
    pub(crate) repository: String,
    pub(crate) images: Vec<ImageRecord>,
}

/// Something that can list the tagged images of a repository.
#[async_trait]
pub(crate) trait ImageSource {
    async fn tagged_images(&self, repository: &str) -> Result<Vec<ImageRecord>>;
}

/// Pages through DescribeImages for one repository, tagged images only.
struct ImagePages<'a> {
    client: &'a EcrClient,
    repository: &'a str,
}

#[async_trait]
impl<'a> PageSource for ImagePages<'a> {
    type Item = ImageRecord;
    type Error = Error;

    async fn fetch_page(&self, next_token: Option<String>) -> Result<Page<ImageRecord>> {
        let response = self
            .client
            .describe_images()
            .repository_name(self.repository)
            .filter(
                DescribeImagesFilter::builder()
                    .tag_status(TagStatus::Tagged)
                    .build(),
            )
            .set_next_token(next_token)
            .send()
            .await
            .context(error::DescribeImagesSnafu {
                repository: self.repository,
            })?;

        let images = response
            .image_details()
            .iter()
            .map(ImageRecord::from)
            .collect();
        Ok(Page::new(images, response.next_token().map(str::to_string)))
    }
}

/// Lists images with ECR's DescribeImages.
pub(crate) struct EcrImages {
    client: EcrClient,
}

impl EcrImages {
    pub(crate) fn new(client: EcrClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSource for EcrImages {
    async fn tagged_images(&self, repository: &str) -> Result<Vec<ImageRecord>> {
        debug!("Describing images in {}", repository);
        let pages = ImagePages {
            client: &self.client,
            repository,
        };
        let images = collect_pages(&pages, |_| true).await?;
        debug!("Found {} tagged images in {}", images.len(), repository);
        Ok(images)
    }
}

/// Lists the tagged images of every repository, with at most `threads` repositories being
/// described at once.  Results come back in completion order.
pub(crate) async fn describe_repositories<S>(
    source: &S,
    repositories: &[String],
    threads: NonZeroUsize,
    progress: Option<&ProgressBar>,
) -> Result<Vec<RepositoryImages>>
where
    S: ImageSource + Sync,
{
    info!(
        "Describing images in {} repositories, {} at a time",
        repositories.len(),
        threads
    );
    fan_out(repositories, threads, |repository| async move {
        let images = source.tagged_images(repository).await?;
        if let Some(progress) = progress {
            progress.inc(1);
        }
        Ok::<_, Error>(RepositoryImages {
            repository: repository.clone(),
            images,
        })
    })
    .await
}

mod error {
    use aws_sdk_ecr::error::SdkError;
    use aws_sdk_ecr::operation::describe_images::DescribeImagesError;
    use aws_smithy_types::error::display::DisplayErrorContext;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display(
            "Failed to describe images in repository {}: {}",
            repository,
            DisplayErrorContext(source)
        ))]
        DescribeImages {
            repository: String,
            source: SdkError<DescribeImagesError>,
        },
    }
}
pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
pub(crate) mod test {
    use super::{describe_repositories, ImageRecord, ImageSource, Result};
    use async_trait::async_trait;
    use aws_sdk_ecr::types::ImageDetail;
    use aws_smithy_types::DateTime as SmithyDateTime;
    use chrono::{TimeZone, Utc};
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) fn image(digest: &str, tags: &[&str], size_bytes: u64) -> ImageRecord {
        ImageRecord {
            digest: digest.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pushed_at: None,
            size_bytes,
        }
    }

    /// Every repository holds as many 100-byte images as its name is long.
    struct MockImages {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ImageSource for MockImages {
        async fn tagged_images(&self, repository: &str) -> Result<Vec<ImageRecord>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok((0..repository.len())
                .map(|i| image(&format!("sha256:{}{}", repository, i), &["latest"], 100))
                .collect())
        }
    }

    #[test]
    fn record_from_image_detail() {
        let detail = ImageDetail::builder()
            .image_digest("sha256:abc")
            .image_tags("1.0")
            .image_tags("latest")
            .image_pushed_at(SmithyDateTime::from_secs(1_700_000_000))
            .image_size_in_bytes(2048)
            .build();
        assert_eq!(
            ImageRecord::from(&detail),
            ImageRecord {
                digest: "sha256:abc".to_string(),
                tags: vec!["1.0".to_string(), "latest".to_string()],
                pushed_at: Utc.timestamp_opt(1_700_000_000, 0).single(),
                size_bytes: 2048,
            }
        );
    }

    #[test]
    fn record_without_optional_fields() {
        let record = ImageRecord::from(&ImageDetail::builder().image_digest("sha256:def").build());
        assert!(record.tags.is_empty());
        assert_eq!(record.pushed_at, None);
        assert_eq!(record.size_bytes, 0);
    }

    #[tokio::test]
    async fn every_repository_is_described_within_limit() {
        let source = MockImages {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let repositories: Vec<String> = (1..=12).map(|i| "r".repeat(i)).collect();
        let mut results = describe_repositories(
            &source,
            &repositories,
            NonZeroUsize::new(3).unwrap(),
            None,
        )
        .await
        .unwrap();

        results.sort_by(|a, b| a.repository.len().cmp(&b.repository.len()));
        assert_eq!(results.len(), 12);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.images.len(), i + 1);
        }
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
    }
}
