//! The profiles module owns writing SSO profiles into the AWS shared credentials and config
//! files.
//!
//! Files are rewritten line by line rather than parsed and re-serialized: every line outside the
//! sections we own is copied through untouched, so other profiles keep their comments, quoting,
//! and backslashes.  A section with the same name as a new profile keeps its place and its
//! comments, but its settings are replaced.

use log::{debug, info};
use snafu::{OptionExt, ResultExt};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = "credentials";
const CONFIG_FILE: &str = "config";
const OUTPUT_FORMAT: &str = "json";

/// Everything written for one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProfileEntry {
    pub(crate) profile: String,
    pub(crate) start_url: String,
    pub(crate) sso_region: String,
    pub(crate) account_id: String,
    pub(crate) role_name: String,

    /// Region the profile's requests go to by default
    pub(crate) default_region: String,
}

type Settings = Vec<(&'static str, String)>;

impl ProfileEntry {
    fn credentials_settings(&self) -> Settings {
        vec![
            ("sso_start_url", self.start_url.clone()),
            ("sso_region", self.sso_region.clone()),
            ("sso_account_id", self.account_id.clone()),
            ("sso_role_name", self.role_name.clone()),
        ]
    }

    fn config_settings(&self) -> Settings {
        vec![
            ("region", self.default_region.clone()),
            ("format", OUTPUT_FORMAT.to_string()),
            ("output", OUTPUT_FORMAT.to_string()),
        ]
    }
}

/// The user's `~/.aws` directory.
pub(crate) fn aws_dir() -> Result<PathBuf> {
    let home = home::home_dir().context(error::HomeSnafu)?;
    Ok(home.join(".aws"))
}

/// Writes `entries` to the credentials and config files in `aws_dir`, creating the directory
/// and files if needed.
pub(crate) fn write_profiles(aws_dir: &Path, entries: &[ProfileEntry]) -> Result<()> {
    fs::create_dir_all(aws_dir).context(error::CreateDirSnafu { path: aws_dir })?;

    let credentials = aws_dir.join(CREDENTIALS_FILE);
    info!("Writing credentials file: {}", credentials.display());
    update_file(&credentials, entries, ProfileEntry::credentials_settings)?;

    let config = aws_dir.join(CONFIG_FILE);
    info!("Writing config file: {}", config.display());
    update_file(&config, entries, ProfileEntry::config_settings)?;
    Ok(())
}

fn update_file<F>(path: &Path, entries: &[ProfileEntry], settings: F) -> Result<()>
where
    F: Fn(&ProfileEntry) -> Settings,
{
    let existing = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} doesn't exist yet, starting empty", path.display());
            String::new()
        }
        Err(e) => return Err(e).context(error::LoadSnafu { path }),
    };

    let sections: Vec<(&str, Settings)> = entries
        .iter()
        .map(|entry| {
            info!("Writing profile {}", entry.profile);
            (entry.profile.as_str(), settings(entry))
        })
        .collect();

    fs::write(path, merge_sections(&existing, &sections)).context(error::WriteSnafu { path })
}

/// The name in a `[name]` header line, if the line is one.
fn section_name(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(rest[..end].trim())
}

/// Whether the line holds a setting, as opposed to a comment or nothing.
fn is_setting(line: &str) -> bool {
    let line = line.trim_start();
    !(line.is_empty() || line.starts_with('#') || line.starts_with(';'))
}

fn push_settings(out: &mut String, settings: &Settings) {
    for (key, value) in settings {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
}

/// Returns `existing` with each of `sections` written in: an existing section of the same name
/// has its settings replaced where it stands (later duplicates of it are dropped), and sections
/// not present yet are appended, separated by a blank line.
fn merge_sections(existing: &str, sections: &[(&str, Settings)]) -> String {
    let mut out = String::with_capacity(existing.len());
    let mut written = vec![false; sections.len()];
    let mut replacing = false;
    let mut dropping = false;

    for line in existing.split_inclusive('\n') {
        if let Some(name) = section_name(line) {
            replacing = false;
            dropping = false;
            if let Some(index) = sections.iter().position(|(profile, _)| *profile == name) {
                if written[index] {
                    debug!("Dropping duplicate section [{}]", name);
                    dropping = true;
                    continue;
                }
                debug!("Replacing existing section [{}]", name);
                written[index] = true;
                replacing = true;
                out.push_str(line);
                if !line.ends_with('\n') {
                    out.push('\n');
                }
                push_settings(&mut out, &sections[index].1);
                continue;
            }
        } else if dropping || (replacing && is_setting(line)) {
            continue;
        }
        out.push_str(line);
    }

    for ((profile, settings), done) in sections.iter().zip(written) {
        if done {
            continue;
        }
        if !out.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            if !out.ends_with("\n\n") {
                out.push('\n');
            }
        }
        out.push('[');
        out.push_str(profile);
        out.push_str("]\n");
        push_settings(&mut out, settings);
    }
    out
}

mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to create directory '{}': {}", path.display(), source))]
        CreateDir { path: PathBuf, source: io::Error },

        #[snafu(display("Unable to find the home directory of the current user"))]
        Home,

        #[snafu(display("Failed to read '{}': {}", path.display(), source))]
        Load { path: PathBuf, source: io::Error },

        #[snafu(display("Failed to write '{}': {}", path.display(), source))]
        Write { path: PathBuf, source: io::Error },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::{merge_sections, write_profiles, ProfileEntry};
    use std::fs;

    fn entry(profile: &str, account_id: &str, role_name: &str) -> ProfileEntry {
        ProfileEntry {
            profile: profile.to_string(),
            start_url: "https://example.awsapps.com/start".to_string(),
            sso_region: "eu-west-1".to_string(),
            account_id: account_id.to_string(),
            role_name: role_name.to_string(),
            default_region: "us-east-1".to_string(),
        }
    }

    #[test]
    fn creates_missing_directory_and_files() {
        let home = tempfile::tempdir().unwrap();
        let aws_dir = home.path().join(".aws");

        write_profiles(&aws_dir, &[entry("prod", "111", "Admin")]).unwrap();

        assert_eq!(
            fs::read_to_string(aws_dir.join("credentials")).unwrap(),
            "[prod]\n\
             sso_start_url = https://example.awsapps.com/start\n\
             sso_region = eu-west-1\n\
             sso_account_id = 111\n\
             sso_role_name = Admin\n"
        );
        assert_eq!(
            fs::read_to_string(aws_dir.join("config")).unwrap(),
            "[prod]\nregion = us-east-1\nformat = json\noutput = json\n"
        );
    }

    #[test]
    fn unrelated_sections_survive_byte_for_byte() {
        let home = tempfile::tempdir().unwrap();
        let aws_dir = home.path().join(".aws");
        fs::create_dir_all(&aws_dir).unwrap();
        let unrelated = "# team config, do not edit\n\
                         [default]\n\
                         credential_process = C:\\tools\\new\\get-creds.exe --profile x\n\
                         ca_bundle = C:\\certs\\bundle.pem\n\
                         ; legacy settings below\n\
                         cli_pager = \"less -R\" # keep quotes\n\
                         s3 =\n    max_concurrent_requests = 20\n";
        fs::write(aws_dir.join("config"), unrelated).unwrap();

        write_profiles(&aws_dir, &[entry("prod", "111", "Admin")]).unwrap();

        let config = fs::read_to_string(aws_dir.join("config")).unwrap();
        assert!(config.starts_with(unrelated), "unrelated text changed:\n{}", config);
        assert!(config.ends_with("\n\n[prod]\nregion = us-east-1\nformat = json\noutput = json\n"));
    }

    #[test]
    fn colliding_section_replaced_in_place() {
        let existing = "[default]\n\
                        aws_access_key_id = AKIA\n\
                        \n\
                        [prod]\n\
                        # owned by the SSO bootstrap\n\
                        sso_account_id = 999\n\
                        stale_key = old\n\
                        \n\
                        [tools]\n\
                        region = eu-north-1\n";
        let merged = merge_sections(
            existing,
            &[("prod", vec![("sso_account_id", "111".to_string())])],
        );
        assert_eq!(
            merged,
            "[default]\n\
             aws_access_key_id = AKIA\n\
             \n\
             [prod]\n\
             sso_account_id = 111\n\
             # owned by the SSO bootstrap\n\
             \n\
             [tools]\n\
             region = eu-north-1\n"
        );
    }

    #[test]
    fn duplicate_sections_collapse_to_one() {
        let existing = "[prod]\nsso_account_id = 1\n[prod]\nsso_account_id = 2\n[dev]\nx = y\n";
        let merged = merge_sections(
            existing,
            &[("prod", vec![("sso_account_id", "3".to_string())])],
        );
        assert_eq!(merged, "[prod]\nsso_account_id = 3\n[dev]\nx = y\n");
    }

    #[test]
    fn appends_after_file_without_trailing_newline() {
        let merged = merge_sections(
            "[default]\nregion = us-east-1",
            &[("sandbox", vec![("region", "eu-west-1".to_string())])],
        );
        assert_eq!(
            merged,
            "[default]\nregion = us-east-1\n\n[sandbox]\nregion = eu-west-1\n"
        );
    }

    #[test]
    fn several_profiles_in_one_pass() {
        let home = tempfile::tempdir().unwrap();
        let aws_dir = home.path().join(".aws");

        write_profiles(
            &aws_dir,
            &[entry("prod", "111", "Admin"), entry("sandbox", "222", "Developer")],
        )
        .unwrap();

        let credentials = fs::read_to_string(aws_dir.join("credentials")).unwrap();
        assert!(credentials.contains("[prod]\n"));
        assert!(credentials.contains("[sandbox]\n"));
        assert!(credentials.contains("sso_account_id = 222\nsso_role_name = Developer\n"));
    }
}
