use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Required setting {name} is not defined")]
    Configuration { name: &'static str },

    #[error("User {user_id} was not found in the directory")]
    UserNotFound { user_id: String },

    #[error("Customer {customer_id} not found for user {user_id}")]
    CustomerNotFound {
        customer_id: String,
        user_id: String,
    },

    #[error("User {user_id} does not have a refresh token")]
    MissingCredential { user_id: String },

    #[error("Invalid {field} format: '{value}'")]
    InvalidFormat { field: &'static str, value: String },

    #[error("Unknown time zone '{timezone}'")]
    InvalidTimezone { timezone: String },

    #[error("Customer {customer_id} returned a client row without {field}")]
    MalformedUpstreamRow {
        customer_id: String,
        field: &'static str,
    },

    #[error("API responded with status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("API request failed: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}
