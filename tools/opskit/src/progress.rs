//! Progress bars for per-item work.

use indicatif::{ProgressBar, ProgressStyle};
use snafu::ResultExt;

/// Creates a progress bar of `len` steps labelled with `verb`, unless the user asked for none.
pub fn build(no_progress: bool, len: u64, verb: &str) -> Result<Option<ProgressBar>> {
    if no_progress {
        return Ok(None);
    }
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template(&["  ", verb, "  [{bar:50.white/black}] {pos}/{len} ({eta})"].concat())
            .context(error::ProgressBarTemplateSnafu)?
            .progress_chars("=> "),
    );
    Ok(Some(progress_bar))
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Failed to parse progress style template: {}", source))]
        ProgressBarTemplate {
            source: indicatif::style::TemplateError,
        },
    }
}
pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::build;

    #[test]
    fn disabled_bar_is_none() {
        assert!(build(true, 10, "Working").unwrap().is_none());
    }

    #[test]
    fn bar_has_requested_length() {
        let bar = build(false, 7, "Working").unwrap().unwrap();
        assert_eq!(bar.length(), Some(7));
    }
}
