//! The filter module owns the rule used to narrow a listing down to the items the user asked for.

use regex::Regex;
use snafu::{ensure, ResultExt};
use std::collections::BTreeSet;

/// The active filter for a listing.  Exactly one variant is chosen per run, from the command
/// line, and is never re-inspected as a string afterward.
#[derive(Debug, Clone, Default)]
pub enum FilterSpec {
    /// Every item passes
    #[default]
    None,

    /// Only items whose name is in the set
    Include(BTreeSet<String>),

    /// Only items whose name is not in the set
    Exclude(BTreeSet<String>),

    /// Only items whose name matches the pattern
    RegexInclude(Regex),

    /// Only items whose name doesn't match the pattern
    RegexExclude(Regex),
}

impl FilterSpec {
    /// Builds the filter from the four mutually exclusive command-line inputs.  Fails if more
    /// than one of them was given, or if a pattern doesn't compile.
    pub fn from_flags(
        include: &[String],
        exclude: &[String],
        regex_include: Option<&str>,
        regex_exclude: Option<&str>,
    ) -> Result<Self> {
        let given = [
            !include.is_empty(),
            !exclude.is_empty(),
            regex_include.is_some(),
            regex_exclude.is_some(),
        ]
        .iter()
        .filter(|given| **given)
        .count();
        ensure!(given <= 1, error::ConflictingFiltersSnafu { given });

        Ok(if !include.is_empty() {
            Self::Include(include.iter().cloned().collect())
        } else if !exclude.is_empty() {
            Self::Exclude(exclude.iter().cloned().collect())
        } else if let Some(pattern) = regex_include {
            Self::RegexInclude(compile(pattern)?)
        } else if let Some(pattern) = regex_exclude {
            Self::RegexExclude(compile(pattern)?)
        } else {
            Self::None
        })
    }

    /// Whether the named item passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::None => true,
            Self::Include(names) => names.contains(name),
            Self::Exclude(names) => !names.contains(name),
            Self::RegexInclude(re) => re.is_match(name),
            Self::RegexExclude(re) => !re.is_match(name),
        }
    }

    /// Names the provider API can filter on itself, so the request only returns those items.
    pub fn pushdown_names(&self) -> Option<Vec<String>> {
        match self {
            Self::Include(names) => Some(names.iter().cloned().collect()),
            _ => None,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).context(error::InvalidRegexSnafu { pattern })
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display(
            "Only one of the include, exclude, regex and exclude-regex filters may be given, got {}",
            given
        ))]
        ConflictingFilters { given: usize },

        #[snafu(display("Invalid filter pattern '{}': {}", pattern, source))]
        InvalidRegex {
            pattern: String,
            source: regex::Error,
        },
    }
}
pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
