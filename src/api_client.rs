use crate::config::{ApiCredentials, Config};
use crate::error::Error;
use crate::query::ReportQuery;
use crate::records::CampaignStatus;
use log::{debug, error, info};
use reqwest::{header::AUTHORIZATION, Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEVELOPER_TOKEN_HEADER: &str = "developer-token";
const LOGIN_CUSTOMER_ID_HEADER: &str = "login-customer-id";
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AdsApi: Send + Sync + 'static {
    /// Lists the accounts the refresh token can access directly.
    /// # Returns
    /// Resource names of the form `customers/{id}`.
    async fn list_accessible_customers(&self, refresh_token: &str) -> Result<Vec<String>, Error>;

    /// Runs a report query against the account of the session.
    /// # Arguments
    /// * `session` - Account to query and the credentials to query it with.
    /// * `query` - Entity, fields and constraints of the report.
    /// # Returns
    /// A Result containing either the report rows or an Error.
    async fn report(
        &self,
        session: &CustomerSession,
        query: &ReportQuery,
    ) -> Result<Vec<ReportRow>, Error>;
}

/// An authenticated view of one account. When `login_customer_id` is set the
/// API is accessed through that manager account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerSession {
    pub customer_id: String,
    pub login_customer_id: Option<String>,
    pub refresh_token: String,
}

impl CustomerSession {
    pub fn new(customer_id: &str, login_customer_id: Option<&str>, refresh_token: &str) -> Self {
        CustomerSession {
            customer_id: customer_id.to_string(),
            login_customer_id: login_customer_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            refresh_token: refresh_token.to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub customer_client: Option<CustomerClientRow>,
    pub campaign: Option<CampaignRow>,
    pub metrics: Option<MetricsRow>,
    pub campaign_budget: Option<CampaignBudgetRow>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerClientRow {
    pub resource_name: Option<String>,
    pub client_customer: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub level: Option<i64>,
    pub manager: Option<bool>,
    pub descriptive_name: Option<String>,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRow {
    pub resource_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub status: Option<StatusValue>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRow {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub clicks: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub impressions: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub all_conversions: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_cpc: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub cost_micros: Option<i64>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBudgetRow {
    pub resource_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub amount_micros: Option<i64>,
}

/// Campaign status as sent on the wire: an ordinal code or the enum name.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StatusValue {
    Code(i64),
    Name(String),
}

impl StatusValue {
    pub fn decode(&self) -> CampaignStatus {
        match self {
            StatusValue::Code(code) => CampaignStatus::from_code(*code),
            StatusValue::Name(name) => match name.parse::<i64>() {
                Ok(code) => CampaignStatus::from_code(code),
                Err(_) => CampaignStatus::from_name(name),
            },
        }
    }
}

// int64 fields arrive as JSON strings, doubles as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<WireNumber>::deserialize(deserializer)? {
        Some(WireNumber::Int(v)) => Some(v),
        Some(WireNumber::Float(v)) => Some(v as i64),
        Some(WireNumber::Text(s)) => parse_text(&s),
        None => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<WireNumber>::deserialize(deserializer)? {
        Some(WireNumber::Int(v)) => Some(v as f64),
        Some(WireNumber::Float(v)) => Some(v),
        Some(WireNumber::Text(s)) => parse_text(&s),
        None => None,
    })
}

fn parse_text<T: std::str::FromStr>(text: &str) -> Option<T> {
    let parsed = text.trim().parse().ok();
    if parsed.is_none() {
        debug!("Dropping unparsable numeric value {:?}", text);
    }
    parsed
}

/// Extracts the account id from a `customers/{id}` resource name.
pub fn customer_id_from_resource_name(resource_name: &str) -> String {
    resource_name
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "customers")
        .next_back()
        .unwrap_or_default()
        .to_string()
}

pub struct GoogleAdsClient {
    client: Client,
    base_url: String,
    token_url: String,
    credentials: ApiCredentials,
    tokens: Mutex<HashMap<String, AccessToken>>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ReportRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibleCustomers {
    #[serde(default)]
    resource_names: Vec<String>,
}

impl GoogleAdsClient {
    /// Builds the client, failing before any network call when a required
    /// secret is missing from the configuration.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let credentials = config
            .credentials()
            .inspect_err(|err| error!("Cannot create ads API client: {}", err))?;

        info!("Ads API client created for {}", config.api_url);

        Ok(GoogleAdsClient {
            client: Client::new(),
            base_url: config.api_url.to_string(),
            token_url: config.oauth_token_url.to_string(),
            credentials,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn cached_token(&self, refresh_token: &str) -> Option<String> {
        let tokens = self.tokens.lock().ok()?;
        tokens
            .get(refresh_token)
            .filter(|token| token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN)
            .map(|token| token.value.clone())
    }

    async fn access_token(&self, refresh_token: &str) -> Result<String, Error> {
        if let Some(token) = self.cached_token(refresh_token) {
            return Ok(token);
        }

        debug!("Exchanging refresh token for an access token");
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let grant: TokenGrant = read_json(resp).await?;

        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(
                refresh_token.to_string(),
                AccessToken {
                    value: grant.access_token.clone(),
                    expires_at: Instant::now() + Duration::from_secs(grant.expires_in),
                },
            );
        }

        Ok(grant.access_token)
    }
}

#[async_trait::async_trait]
impl AdsApi for GoogleAdsClient {
    async fn list_accessible_customers(&self, refresh_token: &str) -> Result<Vec<String>, Error> {
        let url = self.endpoint(&["customers:listAccessibleCustomers"])?;
        let access_token = self.access_token(refresh_token).await?;

        debug!("Listing accessible customers");
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(DEVELOPER_TOKEN_HEADER, &self.credentials.developer_token)
            .send()
            .await?;

        let customers: AccessibleCustomers = read_json(resp).await?;
        Ok(customers.resource_names)
    }

    async fn report(
        &self,
        session: &CustomerSession,
        query: &ReportQuery,
    ) -> Result<Vec<ReportRow>, Error> {
        let url = self.endpoint(&["customers", &session.customer_id, "googleAds:search"])?;
        let access_token = self.access_token(&session.refresh_token).await?;
        let gaql = query.to_gaql();

        debug!(
            "Querying {} for customer {} (login customer {:?})",
            query.entity, session.customer_id, session.login_customer_id
        );

        let mut request = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(DEVELOPER_TOKEN_HEADER, &self.credentials.developer_token)
            .json(&serde_json::json!({ "query": gaql }));
        if let Some(login_customer_id) = &session.login_customer_id {
            request = request.header(LOGIN_CUSTOMER_ID_HEADER, login_customer_id);
        }

        let response: SearchResponse = read_json(request.send().await?).await?;
        Ok(response.results)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    Ok(resp.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn test_config(api_url: &str, oauth_token_url: &str) -> Config {
        Config {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            developer_token: Some("dev-token".to_string()),
            api_url: api_url.to_string(),
            oauth_token_url: oauth_token_url.to_string(),
            directory_path: "./users.json".to_string(),
            output_dir: "./".to_string(),
        }
    }

    #[test]
    fn test_new_without_developer_token() {
        let config = Config {
            developer_token: None,
            ..test_config("https://api.example.com", "https://oauth.example.com")
        };
        assert!(matches!(
            GoogleAdsClient::new(&config),
            Err(Error::Configuration { name: "DEVELOPER_TOKEN" })
        ));
    }

    #[tokio::test]
    async fn test_report_invalid_url() {
        let client =
            GoogleAdsClient::new(&test_config("invalid_url", "https://oauth.example.com")).unwrap();
        let session = CustomerSession::new("123", None, "refresh");

        let result = client
            .report(&session, &ReportQuery::customer_clients())
            .await;
        assert!(matches!(result.unwrap_err(), Error::UrlParsingFailed(_)));
    }

    #[test]
    fn test_customer_id_from_resource_name() {
        assert_eq!(customer_id_from_resource_name("customers/1234567890"), "1234567890");
        assert_eq!(customer_id_from_resource_name("customers/12/"), "12");
        assert_eq!(customer_id_from_resource_name(""), "");
    }

    #[test]
    fn test_session_ignores_empty_login_customer() {
        let session = CustomerSession::new("123", Some(""), "refresh");
        assert_eq!(session.login_customer_id, None);
    }

    #[test]
    fn test_report_row_accepts_string_int64() {
        let row: ReportRow = serde_json::from_value(json!({
            "campaign": { "id": "9", "name": "Brand", "status": "ENABLED" },
            "metrics": { "costMicros": "3000000", "clicks": "12", "averageCpc": 250000.5 },
            "campaignBudget": { "id": 5, "amountMicros": "10000000" }
        }))
        .unwrap();

        let campaign = row.campaign.unwrap();
        assert_eq!(campaign.id, Some(9));
        assert_eq!(campaign.status.unwrap().decode(), CampaignStatus::Enabled);
        let metrics = row.metrics.unwrap();
        assert_eq!(metrics.cost_micros, Some(3_000_000));
        assert_eq!(metrics.clicks, Some(12));
        assert_eq!(metrics.average_cpc, Some(250000.5));
        assert_eq!(metrics.impressions, None);
        assert_eq!(row.campaign_budget.unwrap().amount_micros, Some(10_000_000));
        assert!(row.customer_client.is_none());
    }

    #[test]
    fn test_unparsable_numbers_decode_as_missing() {
        let row: ReportRow = serde_json::from_value(json!({
            "customerClient": { "id": "abc", "level": "1", "resourceName": "customers/1/customerClients/2" },
            "metrics": { "averageCpc": "n/a", "clicks": " 7 " }
        }))
        .unwrap();

        let client = row.customer_client.unwrap();
        assert_eq!(client.id, None);
        assert_eq!(client.level, Some(1));
        let metrics = row.metrics.unwrap();
        assert_eq!(metrics.average_cpc, None);
        assert_eq!(metrics.clicks, Some(7));
    }

    #[test]
    fn test_status_value_decoding() {
        assert_eq!(StatusValue::Code(3).decode(), CampaignStatus::Paused);
        assert_eq!(StatusValue::Code(42).decode(), CampaignStatus::Unspecified);
        assert_eq!(StatusValue::Name("4".into()).decode(), CampaignStatus::Removed);
        assert_eq!(StatusValue::Name("REMOVED".into()).decode(), CampaignStatus::Removed);
    }

    #[tokio::test]
    async fn test_report_sends_query_and_headers() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_includes("grant_type=refresh_token")
                    .body_includes("refresh_token=refresh-1");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(json!({ "access_token": "access-1", "expires_in": 3600 }).to_string());
            })
            .await;
        let _search_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v18/customers/333/googleAds:search")
                    .header("authorization", "Bearer access-1")
                    .header("developer-token", "dev-token")
                    .header("login-customer-id", "222")
                    .body_includes("FROM customer_client");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        json!({
                            "results": [{
                                "customerClient": {
                                    "resourceName": "customers/333/customerClients/333",
                                    "id": "333",
                                    "level": "0",
                                    "manager": false,
                                    "currencyCode": "EUR",
                                    "timeZone": "Europe/Berlin",
                                    "descriptiveName": "Client"
                                }
                            }]
                        })
                        .to_string(),
                    );
            })
            .await;

        let client =
            GoogleAdsClient::new(&test_config(&server.url("/v18"), &server.url("/token"))).unwrap();
        let session = CustomerSession::new("333", Some("222"), "refresh-1");

        let rows = client
            .report(&session, &ReportQuery::customer_clients())
            .await
            .unwrap();
        // second call reuses the cached access token
        client
            .report(&session, &ReportQuery::customer_clients())
            .await
            .unwrap();

        token_mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        let customer = rows[0].customer_client.clone().unwrap();
        assert_eq!(customer.id, Some(333));
        assert_eq!(customer.level, Some(0));
        assert_eq!(customer.currency_code.as_deref(), Some("EUR"));
    }

    #[tokio::test]
    async fn test_report_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(json!({ "access_token": "access-1" }).to_string());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v18/customers/444/googleAds:search");
                then.status(403).body("USER_PERMISSION_DENIED");
            })
            .await;

        let client =
            GoogleAdsClient::new(&test_config(&server.url("/v18"), &server.url("/token"))).unwrap();
        let session = CustomerSession::new("444", None, "refresh-1");

        let result = client.report(&session, &ReportQuery::campaign_list(&[])).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Upstream { status: 403, body } if body == "USER_PERMISSION_DENIED"
        ));
    }

    #[tokio::test]
    async fn test_list_accessible_customers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(json!({ "access_token": "access-2", "expires_in": 3600 }).to_string());
            })
            .await;
        let list_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v18/customers:listAccessibleCustomers")
                    .header("authorization", "Bearer access-2");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(json!({ "resourceNames": ["customers/111", "customers/222"] }).to_string());
            })
            .await;

        let client =
            GoogleAdsClient::new(&test_config(&server.url("/v18"), &server.url("/token"))).unwrap();

        let names = client.list_accessible_customers("refresh-2").await.unwrap();

        list_mock.assert_async().await;
        assert_eq!(names, vec!["customers/111", "customers/222"]);
    }

    #[tokio::test]
    async fn test_token_exchange_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).body("invalid_grant");
            })
            .await;

        let client =
            GoogleAdsClient::new(&test_config(&server.url("/v18"), &server.url("/token"))).unwrap();

        let result = client.list_accessible_customers("revoked").await;
        assert!(matches!(result.unwrap_err(), Error::Upstream { status: 400, .. }));
    }
}
