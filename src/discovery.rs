//! Breadth-first discovery of every account reachable from the accounts a user
//! can access directly.
//!
//! Each level of the manager hierarchy is queried as one batch. A failed query
//! prunes that branch only; its siblings keep going. Accounts reachable via
//! several managers are reported once per path, and the walk has no guard
//! against upstream data that links a descendant back to an ancestor.

use crate::api_client::{
    customer_id_from_resource_name, AdsApi, CustomerClientRow, CustomerSession,
};
use crate::batch::{settle_all, Settled};
use crate::clock::Clock;
use crate::directory::UserDirectory;
use crate::error::Error;
use crate::query::ReportQuery;
use crate::records::AccountRecord;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

/// An account whose clients have not been queried yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontierEntry {
    pub customer_id: String,
    /// Manager to authenticate through; `None` for root accounts.
    pub manager_id: Option<String>,
    /// Root account of the tree this entry belongs to.
    pub root_id: String,
}

impl FrontierEntry {
    fn root(customer_id: &str) -> Self {
        FrontierEntry {
            customer_id: customer_id.to_string(),
            manager_id: None,
            root_id: customer_id.to_string(),
        }
    }
}

/// A branch of the hierarchy that could not be expanded.
#[derive(Debug)]
pub struct BranchFailure {
    pub customer_id: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct AccountDiscovery {
    pub accounts: Vec<AccountRecord>,
    pub failures: Vec<BranchFailure>,
}

/// Walks the hierarchy below `root_ids` level by level.
///
/// Returns every account found, plus the branches whose query failed. A client
/// row without an id, resource name or numeric level aborts the whole walk with
/// `Error::MalformedUpstreamRow`.
pub async fn discover_accounts<A, C>(
    api: &A,
    clock: &C,
    root_ids: &[String],
    refresh_token: &str,
    user_id: &str,
) -> Result<AccountDiscovery, Error>
where
    A: AdsApi + ?Sized,
    C: Clock + ?Sized,
{
    let query = ReportQuery::customer_clients();
    let mut discovery = AccountDiscovery::default();
    let mut frontier: Vec<FrontierEntry> =
        root_ids.iter().map(|id| FrontierEntry::root(id)).collect();

    while !frontier.is_empty() {
        debug!("Querying clients of {} accounts", frontier.len());

        let batch = settle_all(std::mem::take(&mut frontier).into_iter().map(|entry| {
            let session = CustomerSession::new(
                &entry.customer_id,
                entry.manager_id.as_deref(),
                refresh_token,
            );
            let query = &query;
            (entry, async move { api.report(&session, query).await })
        }))
        .await;

        for Settled { key: entry, outcome } in batch {
            let rows = match outcome {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(
                        "Skipping clients of customer {}: {}",
                        entry.customer_id, err
                    );
                    discovery.failures.push(BranchFailure {
                        customer_id: entry.customer_id,
                        error: err,
                    });
                    continue;
                }
            };

            for row in rows {
                let Some(client) = row.customer_client else {
                    continue;
                };

                let account = account_record(client, &entry, user_id, clock.now()).inspect_err(
                    |err| error!("Account discovery for user {} aborted: {}", user_id, err),
                )?;

                if account.is_manager && account.level != 0 {
                    frontier.push(FrontierEntry {
                        customer_id: account.customer_id.clone(),
                        manager_id: account.manager_ids.first().cloned(),
                        root_id: entry.root_id.clone(),
                    });
                }

                discovery.accounts.push(account);
            }
        }
    }

    Ok(discovery)
}

/// Discovers the accounts of a user from the accounts its refresh token can
/// access directly.
pub async fn discover_user_accounts<A, D, C>(
    api: &A,
    directory: &D,
    clock: &C,
    user_id: &str,
) -> Result<AccountDiscovery, Error>
where
    A: AdsApi + ?Sized,
    D: UserDirectory + ?Sized,
    C: Clock + ?Sized,
{
    let user = directory.fetch_user(user_id).await?;
    let Some(refresh_token) = user.refresh_token else {
        error!("User {} has no refresh token", user_id);
        return Err(Error::MissingCredential {
            user_id: user_id.to_string(),
        });
    };

    let root_ids: Vec<String> = api
        .list_accessible_customers(&refresh_token)
        .await?
        .iter()
        .map(|name| customer_id_from_resource_name(name))
        .collect();
    info!("User {} has {} root accounts", user_id, root_ids.len());

    let discovery = discover_accounts(api, clock, &root_ids, &refresh_token, user_id).await?;
    info!(
        "Discovered {} accounts for user {} ({} branches failed)",
        discovery.accounts.len(),
        user_id,
        discovery.failures.len()
    );

    Ok(discovery)
}

fn account_record(
    client: CustomerClientRow,
    entry: &FrontierEntry,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<AccountRecord, Error> {
    let malformed = |field| Error::MalformedUpstreamRow {
        customer_id: entry.customer_id.clone(),
        field,
    };

    let id = client.id.ok_or_else(|| malformed("id"))?;
    let resource_name = client
        .resource_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed("resource_name"))?;
    let level = client.level.ok_or_else(|| malformed("level"))?;

    // Only a root's own row has no manager.
    let manager_ids = if level == 0 && entry.manager_id.is_none() {
        vec![]
    } else {
        vec![entry.customer_id.clone()]
    };

    Ok(AccountRecord {
        customer_id: id.to_string(),
        resource_name,
        level,
        is_manager: client.manager.unwrap_or(false),
        manager_ids,
        login_customer_id: entry.root_id.clone(),
        currency: client.currency_code.unwrap_or_default(),
        time_zone: client.time_zone.unwrap_or_default(),
        name: client.descriptive_name.unwrap_or_default(),
        owner_id: user_id.to_string(),
        last_updated: now,
    })
}
