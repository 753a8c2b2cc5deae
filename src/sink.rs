use crate::config::Config;
use crate::error::Error;
use crate::records::{AccountRecord, CampaignRecord};
use serde::Serialize;
use std::path::PathBuf;

#[async_trait::async_trait]
pub trait RecordSink: Send + Sync + 'static {
    /// Stores every account discovered for the user.
    async fn save_accounts(&self, user_id: &str, accounts: &[AccountRecord]) -> Result<(), Error>;

    /// Stores the campaigns fetched for one account.
    async fn save_campaigns(
        &self,
        customer_id: &str,
        campaigns: &[CampaignRecord],
    ) -> Result<(), Error>;
}

/// Writes one pretty-printed JSON document per user or account into the
/// output directory, replacing the previous document.
#[derive(Clone)]
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(config: &Config) -> Self {
        JsonFileSink {
            output_dir: PathBuf::from(&config.output_dir),
        }
    }

    async fn write<T>(
        &self,
        prefix: &str,
        field: &'static str,
        id: &str,
        records: &[T],
    ) -> Result<(), Error>
    where
        T: Serialize + Sync,
    {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(Error::InvalidFormat {
                field,
                value: id.to_string(),
            });
        }
        let file_name = format!("{}-{}.json", prefix, id);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let body = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(self.output_dir.join(file_name), body).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordSink for JsonFileSink {
    async fn save_accounts(&self, user_id: &str, accounts: &[AccountRecord]) -> Result<(), Error> {
        self.write("accounts", "user_id", user_id, accounts).await
    }

    async fn save_campaigns(
        &self,
        customer_id: &str,
        campaigns: &[CampaignRecord],
    ) -> Result<(), Error> {
        self.write("campaigns", "customer_id", customer_id, campaigns)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn sink_in(temp_dir: &TempDir) -> JsonFileSink {
        JsonFileSink::new(&Config {
            output_dir: temp_dir.path().join("out").to_str().unwrap().to_string(),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_save_accounts() {
        let temp_dir = TempDir::new().unwrap();
        let sink = sink_in(&temp_dir);
        let account = AccountRecord {
            customer_id: "111".to_string(),
            resource_name: "customers/111/customerClients/111".to_string(),
            level: 0,
            is_manager: false,
            manager_ids: vec![],
            login_customer_id: "111".to_string(),
            currency: "USD".to_string(),
            time_zone: "America/New_York".to_string(),
            name: "Solo".to_string(),
            owner_id: "user-1".to_string(),
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        };

        sink.save_accounts("user-1", &[account.clone()]).await.unwrap();

        let written = std::fs::read(temp_dir.path().join("out/accounts-user-1.json")).unwrap();
        let stored: Vec<AccountRecord> = serde_json::from_slice(&written).unwrap();
        assert_eq!(stored, vec![account]);
    }

    #[tokio::test]
    async fn test_save_no_campaigns_writes_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        let sink = sink_in(&temp_dir);

        sink.save_campaigns("333", &[]).await.unwrap();

        let written =
            std::fs::read_to_string(temp_dir.path().join("out/campaigns-333.json")).unwrap();
        assert_eq!(written, "[]");
    }

    #[tokio::test]
    async fn test_ids_with_path_separators_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let sink = sink_in(&temp_dir);

        let result = sink.save_accounts("../escape", &[]).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidFormat { field: "user_id", value } if value == "../escape"
        ));
        let result = sink.save_campaigns("..", &[]).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidFormat { field: "customer_id", .. }
        ));
        assert!(!temp_dir.path().join("out").exists());
    }
}
