use crate::api_client::{AdsApi, CustomerSession, ReportRow};
use crate::clock::{cost_window, Clock};
use crate::directory::UserDirectory;
use crate::error::Error;
use crate::query::ReportQuery;
use crate::records::{
    micros_to_units, CampaignBudgetRecord, CampaignMetricsRecord, CampaignRecord, CampaignStatus,
};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::collections::HashMap;

pub const DEFAULT_COST_WINDOW_DAYS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CampaignRequest {
    pub user_id: String,
    pub customer_id: String,
    /// IANA time zone of the account, used for the cost window dates.
    pub timezone: String,
    /// Restricts the fetch to these campaigns; empty means all of them.
    pub campaign_ids: Vec<String>,
    pub x_days: u32,
}

impl CampaignRequest {
    pub fn new(user_id: &str, customer_id: &str, timezone: &str) -> Self {
        CampaignRequest {
            user_id: user_id.to_string(),
            customer_id: customer_id.to_string(),
            timezone: timezone.to_string(),
            campaign_ids: vec![],
            x_days: DEFAULT_COST_WINDOW_DAYS,
        }
    }
}

/// Fetches the enabled and paused campaigns of an account with their
/// month-to-date metrics and average daily cost over the trailing window.
///
/// # Returns
/// One record per campaign row, in the order the API returned them. Rows
/// missing their campaign, metrics or budget part are left out.
pub async fn fetch_campaigns<A, D, C>(
    api: &A,
    directory: &D,
    clock: &C,
    request: &CampaignRequest,
) -> Result<Vec<CampaignRecord>, Error>
where
    A: AdsApi + ?Sized,
    D: UserDirectory + ?Sized,
    C: Clock + ?Sized,
{
    info!(
        "Fetching campaigns for customer {}, user {}",
        request.customer_id, request.user_id
    );

    let user = directory.fetch_user(&request.user_id).await?;
    let customer = directory
        .fetch_customer(&request.user_id, &request.customer_id)
        .await?
        .ok_or_else(|| Error::CustomerNotFound {
            customer_id: request.customer_id.clone(),
            user_id: request.user_id.clone(),
        })
        .inspect_err(|err| error!("{}", err))?;
    let refresh_token = user
        .refresh_token
        .ok_or_else(|| Error::MissingCredential {
            user_id: request.user_id.clone(),
        })
        .inspect_err(|err| error!("{}", err))?;

    validate_numeric("customer_id", &customer.customer_id)?;
    if let Some(login_customer_id) = &customer.login_customer_id {
        if !login_customer_id.is_empty() {
            validate_numeric("login_customer_id", login_customer_id)?;
        }
    }
    for campaign_id in &request.campaign_ids {
        validate_numeric("campaign_id", campaign_id)?;
    }
    if request.x_days == 0 {
        return Err(Error::InvalidFormat {
            field: "x_days",
            value: request.x_days.to_string(),
        });
    }

    let session = CustomerSession::new(
        &customer.customer_id,
        customer.login_customer_id.as_deref(),
        &refresh_token,
    );
    info!(
        "Created session for customer {}, login customer {}",
        session.customer_id,
        session.login_customer_id.as_deref().unwrap_or("none")
    );

    let (start, end) = cost_window(clock.now(), &request.timezone, request.x_days)?;

    let campaigns = api
        .report(&session, &ReportQuery::campaign_list(&request.campaign_ids))
        .await
        .inspect_err(|err| {
            error!(
                "Campaign list query failed for customer {}: {}",
                request.customer_id, err
            )
        })?;
    info!(
        "Fetched {} campaigns for customer {}",
        campaigns.len(),
        request.customer_id
    );

    let cost_rows = api
        .report(
            &session,
            &ReportQuery::campaign_cost(&request.campaign_ids, start, end),
        )
        .await
        .inspect_err(|err| {
            error!(
                "Cost average query failed for customer {} over {} days: {}",
                request.customer_id, request.x_days, err
            )
        })?;
    let average_costs = average_daily_costs(&cost_rows, request.x_days);

    let now = clock.now();
    let records: Vec<CampaignRecord> = campaigns
        .into_iter()
        .filter_map(|row| campaign_record(row, &average_costs, request, now))
        .collect();

    info!(
        "Processed {} campaigns for customer {}",
        records.len(),
        request.customer_id
    );
    Ok(records)
}

fn validate_numeric(field: &'static str, value: &str) -> Result<(), Error> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(());
    }

    error!("Invalid {} format: {}", field, value);
    Err(Error::InvalidFormat {
        field,
        value: value.to_string(),
    })
}

/// Reduces cost rows to the average daily cost in micros per campaign id.
fn average_daily_costs(rows: &[ReportRow], x_days: u32) -> HashMap<i64, f64> {
    let mut totals: HashMap<i64, f64> = HashMap::new();
    for row in rows {
        let Some(campaign_id) = row.campaign.as_ref().and_then(|c| c.id) else {
            continue;
        };
        let cost = row
            .metrics
            .as_ref()
            .and_then(|m| m.cost_micros)
            .unwrap_or(0);
        *totals.entry(campaign_id).or_insert(0.0) += cost as f64;
    }

    totals
        .into_iter()
        .map(|(campaign_id, total)| (campaign_id, total / f64::from(x_days)))
        .collect()
}

fn campaign_record(
    row: ReportRow,
    average_costs: &HashMap<i64, f64>,
    request: &CampaignRequest,
    now: DateTime<Utc>,
) -> Option<CampaignRecord> {
    let campaign_id = row.campaign.as_ref().and_then(|c| c.id);
    let (Some(campaign), Some(metrics), Some(budget)) =
        (row.campaign, row.metrics, row.campaign_budget)
    else {
        warn!(
            "Skipped campaign {} for customer {}: missing data",
            campaign_id.map_or_else(|| "unknown".to_string(), |id| id.to_string()),
            request.customer_id
        );
        return None;
    };

    let x_days_average_cost = match campaign_id {
        Some(id) => micros_to_units(average_costs.get(&id).copied()),
        None => 0.0,
    };

    Some(CampaignRecord {
        campaign_id: campaign_id.map(|id| id.to_string()).unwrap_or_default(),
        customer_id: request.customer_id.clone(),
        resource_name: campaign.resource_name.unwrap_or_default(),
        name: campaign.name.unwrap_or_default(),
        status: campaign
            .status
            .map(|status| status.decode())
            .unwrap_or(CampaignStatus::Unspecified),
        campaign_budget: CampaignBudgetRecord {
            budget_id: budget.id.map(|id| id.to_string()).unwrap_or_default(),
            resource_name: budget.resource_name.unwrap_or_default(),
            amount_micros: micros_to_units(budget.amount_micros.map(|v| v as f64)),
        },
        metrics: CampaignMetricsRecord {
            clicks: metrics.clicks.unwrap_or(0),
            impressions: metrics.impressions.unwrap_or(0),
            all_conversions: metrics.all_conversions.unwrap_or(0.0),
            average_cpc: micros_to_units(metrics.average_cpc),
            cost_micros: micros_to_units(metrics.cost_micros.map(|v| v as f64)),
            x_days_average_cost,
        },
        owner_id: request.user_id.clone(),
        first_imported_at: now,
        last_updated: now,
    })
}
