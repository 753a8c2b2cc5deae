use ads_account_sync::campaigns::{CampaignRequest, DEFAULT_COST_WINDOW_DAYS};
use ads_account_sync::config::Config;
use ads_account_sync::error::Error;
use ads_account_sync::runner;
use clap::{Parser, Subcommand};
use log::{error, info};

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover every account reachable by the user and store them.
    Accounts { user_id: String },

    /// Fetch the campaigns of one account and store them.
    Campaigns {
        user_id: String,

        #[arg(help = "Customer id, digits only")]
        customer_id: String,

        #[arg(help = "IANA time zone of the account, e.g. America/New_York")]
        timezone: String,

        #[arg(long = "campaign-id")]
        campaign_ids: Vec<String>,

        #[arg(
            long,
            default_value_t = DEFAULT_COST_WINDOW_DAYS,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::init();

    let result = match &args.command {
        Command::Accounts { user_id } => runner::sync_accounts(args.config, user_id).await,
        Command::Campaigns {
            user_id,
            customer_id,
            timezone,
            campaign_ids,
            days,
        } => {
            let request = CampaignRequest {
                campaign_ids: campaign_ids.clone(),
                x_days: *days,
                ..CampaignRequest::new(user_id, customer_id, timezone)
            };
            runner::sync_campaigns(args.config, &request).await
        }
    };

    match result {
        Ok(summary) => info!(
            "stored {} records ({} branches failed)",
            summary.records, summary.failed_branches
        ),
        Err(err) => {
            error!("sync failed: {}", err);
            std::process::exit(1);
        }
    }

    Ok(())
}
