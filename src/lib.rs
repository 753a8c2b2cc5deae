//! Fetches advertising account hierarchies and campaign performance from the
//! ads API and reshapes them into records for the document store.

pub mod api_client;
pub mod batch;
pub mod campaigns;
pub mod clock;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod query;
pub mod records;
pub mod runner;
pub mod sink;

pub use campaigns::{fetch_campaigns, CampaignRequest};
pub use config::Config;
pub use discovery::{discover_accounts, discover_user_accounts, AccountDiscovery};
pub use error::Error;
pub use records::{AccountRecord, CampaignRecord, CampaignStatus};
