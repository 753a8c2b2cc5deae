use crate::error::Error;
use clap::Args as ClapArgs;

const DEFAULT_API_URL: &str = "https://googleads.googleapis.com/v18";
const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DIRECTORY_PATH: &str = "./users.json";
const OUTPUT_DIR: &str = "./";

#[derive(ClapArgs, Clone, Debug, Default)]
pub struct Config {
    #[arg(long, env = "CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long, env = "DEVELOPER_TOKEN", hide_env_values = true)]
    pub developer_token: Option<String>,

    #[arg(long, default_value = DEFAULT_API_URL, env = "ADS_API_URL")]
    pub api_url: String,

    #[arg(long, default_value = DEFAULT_OAUTH_TOKEN_URL, env = "OAUTH_TOKEN_URL")]
    pub oauth_token_url: String,

    #[arg(long, default_value = DIRECTORY_PATH, env = "DIRECTORY_PATH")]
    pub directory_path: String,

    #[arg(long, default_value = OUTPUT_DIR, env = "OUTPUT_DIR")]
    pub output_dir: String,
}

/// The three secrets every ads API call needs.
#[derive(Clone, Debug)]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub developer_token: String,
}

impl Config {
    /// Validates that the client id, client secret and developer token are all
    /// present. Blank values count as missing.
    pub fn credentials(&self) -> Result<ApiCredentials, Error> {
        Ok(ApiCredentials {
            client_id: required(&self.client_id, "CLIENT_ID")?,
            client_secret: required(&self.client_secret, "CLIENT_SECRET")?,
            developer_token: required(&self.developer_token, "DEVELOPER_TOKEN")?,
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, Error> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::Configuration { name }),
    }
}
