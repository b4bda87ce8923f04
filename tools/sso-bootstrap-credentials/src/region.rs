//! The region module owns finding out which region an SSO start page lives in.
//!
//! The start page embeds its settings as JSON in the element with `id="env"`, either as the
//! element's text or, for `<meta>` tags, in its `content` attribute.

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};

lazy_static! {
    /// The opening tag of the env element; captures the tag name and its attributes.
    static ref ENV_TAG: Regex =
        Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b([^>]*\bid\s*=\s*["']env["'][^>]*)>"#).unwrap();
    /// The `content` attribute, single or double quoted.
    static ref CONTENT_ATTR: Regex =
        Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    /// A character reference: decimal, hex, or named.
    static ref ENTITY: Regex = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
}

#[derive(Debug, Deserialize)]
struct EnvSettings {
    region: String,
}

/// Fetches the start page at `start_url` and reads the SSO region out of it.
pub(crate) async fn discover_region(start_url: &str) -> Result<String> {
    info!("Looking up the SSO region from {}", start_url);
    let response = reqwest::get(start_url)
        .await
        .context(error::FetchSnafu { url: start_url })?
        .error_for_status()
        .context(error::FetchSnafu { url: start_url })?;
    let html = response
        .text()
        .await
        .context(error::FetchSnafu { url: start_url })?;

    let region = region_from_html(&html)?;
    info!("SSO region is {}", region);
    Ok(region)
}

/// Reads the `region` key from the JSON settings in the page's env element.
pub(crate) fn region_from_html(html: &str) -> Result<String> {
    let json = env_json(html).context(error::MissingEnvSnafu)?;
    debug!("Env element holds: {}", json);
    let settings: EnvSettings = serde_json::from_str(&json).context(error::ParseEnvSnafu)?;
    Ok(settings.region)
}

fn env_json(html: &str) -> Option<String> {
    let captures = ENV_TAG.captures(html)?;
    let tag = captures.get(1)?.as_str().to_ascii_lowercase();
    let attributes = captures.get(2)?.as_str();
    let open_end = captures.get(0)?.end();

    // ASCII lowercasing keeps byte offsets, so positions found in `rest` hold for `html`.
    let rest = html[open_end..].to_ascii_lowercase();
    let text = rest
        .find(&format!("</{}", tag))
        .map(|close| html[open_end..open_end + close].trim())
        .filter(|text| !text.is_empty());
    if let Some(text) = text {
        return Some(text.to_string());
    }

    let captures = CONTENT_ATTR.captures(attributes)?;
    let content = captures.get(1).or_else(|| captures.get(2))?.as_str();
    Some(unescape(content))
}

/// Decodes numeric character references and the named ones JSON can contain; anything else is
/// left as written.
fn unescape(value: &str) -> String {
    ENTITY
        .replace_all(value, |captures: &regex::Captures| {
            let reference = &captures[1];
            let decoded = if let Some(hex) = reference
                .strip_prefix("#x")
                .or_else(|| reference.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(decimal) = reference.strip_prefix('#') {
                decimal.parse().ok().and_then(char::from_u32)
            } else {
                match reference {
                    "quot" => Some('"'),
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "apos" => Some('\''),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to fetch SSO start page '{}': {}", url, source))]
        Fetch { url: String, source: reqwest::Error },

        #[snafu(display("SSO start page has no element with id 'env' holding its settings"))]
        MissingEnv,

        #[snafu(display("SSO start page settings aren't valid JSON with a region: {}", source))]
        ParseEnv { source: serde_json::Error },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
