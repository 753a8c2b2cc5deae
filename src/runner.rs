use crate::api_client::GoogleAdsClient;
use crate::campaigns::{fetch_campaigns, CampaignRequest};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::directory::JsonFileDirectory;
use crate::discovery::discover_user_accounts;
use crate::error::Error;
use crate::sink::{JsonFileSink, RecordSink};

/// Counts reported back to the caller after a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub records: usize,
    pub failed_branches: usize,
}

pub async fn sync_accounts(config: Config, user_id: &str) -> Result<SyncSummary, Error> {
    let api_client = GoogleAdsClient::new(&config)?;
    let directory = JsonFileDirectory::new(&config);
    let sink = JsonFileSink::new(&config);

    let discovery = discover_user_accounts(&api_client, &directory, &SystemClock, user_id).await?;

    sink.save_accounts(user_id, &discovery.accounts).await?;

    Ok(SyncSummary {
        records: discovery.accounts.len(),
        failed_branches: discovery.failures.len(),
    })
}

pub async fn sync_campaigns(
    config: Config,
    request: &CampaignRequest,
) -> Result<SyncSummary, Error> {
    let api_client = GoogleAdsClient::new(&config)?;
    let directory = JsonFileDirectory::new(&config);
    let sink = JsonFileSink::new(&config);

    let campaigns = fetch_campaigns(&api_client, &directory, &SystemClock, request).await?;

    sink.save_campaigns(&request.customer_id, &campaigns).await?;

    Ok(SyncSummary {
        records: campaigns.len(),
        failed_branches: 0,
    })
}
