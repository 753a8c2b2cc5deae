use crate::config::Config;
use crate::error::Error;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub refresh_token: Option<String>,
}

/// An account linked to a user, with the manager id to log in through.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredCustomer {
    pub customer_id: String,
    #[serde(default)]
    pub login_customer_id: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Loads the user and its stored refresh token.
    ///
    /// # Returns
    /// The user profile, or `Error::UserNotFound` for unknown users.
    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, Error>;

    /// Looks up an account linked to the user.
    ///
    /// # Returns
    /// `None` when the account is not associated with the user.
    async fn fetch_customer(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<Option<StoredCustomer>, Error>;
}

#[derive(Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<StoredUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    user_id: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    customers: Vec<StoredCustomer>,
}

/// Directory backed by a JSON document on disk, re-read on every lookup.
#[derive(Clone)]
pub struct JsonFileDirectory {
    file_path: String,
}

impl JsonFileDirectory {
    pub fn new(config: &Config) -> Self {
        JsonFileDirectory {
            file_path: config.directory_path.clone(),
        }
    }

    async fn find_user(&self, user_id: &str) -> Result<StoredUser, Error> {
        let bytes = tokio::fs::read(&self.file_path).await?;
        let directory: DirectoryFile = serde_json::from_slice(&bytes)?;

        directory
            .users
            .into_iter()
            .find(|user| user.user_id == user_id)
            .ok_or_else(|| Error::UserNotFound {
                user_id: user_id.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl UserDirectory for JsonFileDirectory {
    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, Error> {
        let user = self.find_user(user_id).await?;

        Ok(UserProfile {
            user_id: user.user_id,
            refresh_token: user.refresh_token.filter(|token| !token.is_empty()),
        })
    }

    async fn fetch_customer(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<Option<StoredCustomer>, Error> {
        let user = self.find_user(user_id).await?;

        Ok(user
            .customers
            .into_iter()
            .find(|customer| customer.customer_id == customer_id))
    }
}
