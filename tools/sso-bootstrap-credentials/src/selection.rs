//! Picking the role each profile should use.

use inquire::Select;
use log::warn;
use snafu::ResultExt;

/// Something that can pick one of several roles for a profile.
pub(crate) trait RoleChooser {
    fn choose(&self, profile: &str, roles: &[String]) -> Result<String>;
}

/// Asks the user with an interactive prompt.
pub(crate) struct PromptChooser;

impl RoleChooser for PromptChooser {
    fn choose(&self, profile: &str, roles: &[String]) -> Result<String> {
        Select::new(
            &format!("Choose the role for account {}", profile),
            roles.to_vec(),
        )
        .with_starting_cursor(0)
        .with_page_size(10)
        .prompt()
        .context(error::PromptSnafu { profile })
    }
}

/// The role to write for `profile`: the only one if there's one, the chooser's pick if there are
/// several, and `None` (with a warning) if there are none.
pub(crate) fn pick_role<C>(chooser: &C, profile: &str, roles: &[String]) -> Result<Option<String>>
where
    C: RoleChooser + ?Sized,
{
    match roles {
        [] => {
            warn!("No roles available in account {}, skipping it", profile);
            Ok(None)
        }
        [role] => Ok(Some(role.clone())),
        _ => chooser.choose(profile, roles).map(Some),
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to choose a role for {}: {}", profile, source))]
        Prompt {
            profile: String,
            source: inquire::InquireError,
        },
    }
}
pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::{pick_role, Result, RoleChooser};
    use std::cell::RefCell;

    /// Picks the last role and remembers who asked.
    #[derive(Default)]
    struct LastRole {
        asked: RefCell<Vec<String>>,
    }

    impl RoleChooser for LastRole {
        fn choose(&self, profile: &str, roles: &[String]) -> Result<String> {
            self.asked.borrow_mut().push(profile.to_string());
            Ok(roles[roles.len() - 1].clone())
        }
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn single_role_needs_no_prompt() {
        let chooser = LastRole::default();
        let role = pick_role(&chooser, "prod", &roles(&["ReadOnly"])).unwrap();
        assert_eq!(role.as_deref(), Some("ReadOnly"));
        assert!(chooser.asked.borrow().is_empty());
    }

    #[test]
    fn several_roles_go_to_chooser() {
        let chooser = LastRole::default();
        let role = pick_role(&chooser, "prod", &roles(&["ReadOnly", "Admin"])).unwrap();
        assert_eq!(role.as_deref(), Some("Admin"));
        assert_eq!(*chooser.asked.borrow(), vec!["prod"]);
    }

    #[test]
    fn no_roles_skips_account() {
        let chooser = LastRole::default();
        assert_eq!(pick_role(&chooser, "audit", &[]).unwrap(), None);
        assert!(chooser.asked.borrow().is_empty());
    }
}
