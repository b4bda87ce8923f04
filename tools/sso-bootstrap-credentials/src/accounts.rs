//! The accounts module owns listing the accounts the SSO user can reach, and the roles they
//! can assume in each.

use async_trait::async_trait;
use aws_sdk_sso::Client as SsoClient;
use log::{debug, info};
use opskit::paginate::{collect_pages, Page, PageSource};
use snafu::ResultExt;

/// An account as ListAccounts describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccountSummary {
    pub(crate) id: String,
    pub(crate) name: String,
}

/// An account together with the roles the user can assume in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SsoAccount {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) roles: Vec<String>,
}

/// Something that knows the user's accounts and roles.
#[async_trait]
pub(crate) trait AccountDirectory {
    async fn accounts(&self) -> Result<Vec<AccountSummary>>;

    async fn roles(&self, account_id: &str) -> Result<Vec<String>>;
}

/// Asks the SSO portal API, authenticated with the device flow's access token.
pub(crate) struct SsoDirectory {
    client: SsoClient,
    access_token: String,
}

impl SsoDirectory {
    pub(crate) fn new(client: SsoClient, access_token: String) -> Self {
        Self {
            client,
            access_token,
        }
    }
}

struct AccountPages<'a> {
    client: &'a SsoClient,
    access_token: &'a str,
}

#[async_trait]
impl<'a> PageSource for AccountPages<'a> {
    type Item = AccountSummary;
    type Error = Error;

    async fn fetch_page(&self, next_token: Option<String>) -> Result<Page<AccountSummary>> {
        if next_token.is_some() {
            info!("Looking for more accounts...");
        }
        let response = self
            .client
            .list_accounts()
            .access_token(self.access_token)
            .set_next_token(next_token)
            .send()
            .await
            .context(error::ListAccountsSnafu)?;

        let accounts = response
            .account_list()
            .iter()
            .filter_map(|account| {
                Some(AccountSummary {
                    id: account.account_id()?.to_string(),
                    name: account.account_name()?.to_string(),
                })
            })
            .collect();
        Ok(Page::new(accounts, response.next_token().map(str::to_string)))
    }
}

struct RolePages<'a> {
    client: &'a SsoClient,
    access_token: &'a str,
    account_id: &'a str,
}

#[async_trait]
impl<'a> PageSource for RolePages<'a> {
    type Item = String;
    type Error = Error;

    async fn fetch_page(&self, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .client
            .list_account_roles()
            .access_token(self.access_token)
            .account_id(self.account_id)
            .set_next_token(next_token)
            .send()
            .await
            .context(error::ListAccountRolesSnafu {
                account_id: self.account_id,
            })?;

        let roles = response
            .role_list()
            .iter()
            .filter_map(|role| role.role_name())
            .map(str::to_string)
            .collect();
        Ok(Page::new(roles, response.next_token().map(str::to_string)))
    }
}

#[async_trait]
impl AccountDirectory for SsoDirectory {
    async fn accounts(&self) -> Result<Vec<AccountSummary>> {
        let pages = AccountPages {
            client: &self.client,
            access_token: &self.access_token,
        };
        collect_pages(&pages, |_| true).await
    }

    async fn roles(&self, account_id: &str) -> Result<Vec<String>> {
        let pages = RolePages {
            client: &self.client,
            access_token: &self.access_token,
            account_id,
        };
        collect_pages(&pages, |_| true).await
    }
}

/// Lists every account in `directory`, then the roles of each, one account at a time.
pub(crate) async fn list_accounts_with_roles<D>(directory: &D) -> Result<Vec<SsoAccount>>
where
    D: AccountDirectory + Sync,
{
    info!("Listing accounts");
    let summaries = directory.accounts().await?;
    info!("Found {} accounts", summaries.len());

    let mut accounts = Vec::with_capacity(summaries.len());
    for summary in summaries {
        debug!("Listing roles in {} ({})", summary.name, summary.id);
        let roles = directory.roles(&summary.id).await?;
        info!("Found {} roles in account {}", roles.len(), summary.name);
        accounts.push(SsoAccount {
            id: summary.id,
            name: summary.name,
            roles,
        });
    }
    Ok(accounts)
}

mod error {
    use aws_sdk_sso::error::SdkError;
    use aws_sdk_sso::operation::list_account_roles::ListAccountRolesError;
    use aws_sdk_sso::operation::list_accounts::ListAccountsError;
    use aws_smithy_types::error::display::DisplayErrorContext;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to list accounts: {}", DisplayErrorContext(source)))]
        ListAccounts { source: SdkError<ListAccountsError> },

        #[snafu(display(
            "Failed to list roles in account {}: {}",
            account_id,
            DisplayErrorContext(source)
        ))]
        ListAccountRoles {
            account_id: String,
            source: SdkError<ListAccountRolesError>,
        },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::{list_accounts_with_roles, AccountDirectory, AccountSummary, Result, SsoAccount};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockDirectory {
        accounts: Vec<AccountSummary>,
        roles: HashMap<&'static str, Vec<&'static str>>,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AccountDirectory for MockDirectory {
        async fn accounts(&self) -> Result<Vec<AccountSummary>> {
            Ok(self.accounts.clone())
        }

        async fn roles(&self, account_id: &str) -> Result<Vec<String>> {
            self.asked.lock().unwrap().push(account_id.to_string());
            Ok(self
                .roles
                .get(account_id)
                .map(|roles| roles.iter().map(|r| r.to_string()).collect())
                .unwrap_or_default())
        }
    }

    fn summary(id: &str, name: &str) -> AccountSummary {
        AccountSummary {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn roles_listed_for_every_account() {
        let directory = MockDirectory {
            accounts: vec![summary("111", "Production"), summary("222", "Sandbox")],
            roles: HashMap::from([
                ("111", vec!["ReadOnly", "Admin"]),
                ("222", vec!["Developer"]),
            ]),
            asked: Mutex::new(Vec::new()),
        };

        let accounts = list_accounts_with_roles(&directory).await.unwrap();
        assert_eq!(
            accounts,
            vec![
                SsoAccount {
                    id: "111".to_string(),
                    name: "Production".to_string(),
                    roles: vec!["ReadOnly".to_string(), "Admin".to_string()],
                },
                SsoAccount {
                    id: "222".to_string(),
                    name: "Sandbox".to_string(),
                    roles: vec!["Developer".to_string()],
                },
            ]
        );
        assert_eq!(*directory.asked.lock().unwrap(), vec!["111", "222"]);
    }

    #[tokio::test]
    async fn account_without_roles_is_kept() {
        let directory = MockDirectory {
            accounts: vec![summary("333", "Audit")],
            roles: HashMap::new(),
            asked: Mutex::new(Vec::new()),
        };
        let accounts = list_accounts_with_roles(&directory).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(accounts[0].roles.is_empty());
    }
}
