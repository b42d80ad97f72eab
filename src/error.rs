use reqwest::StatusCode;

/// Errors returned by the Cal-Adapt and GBIF clients.
///
/// `Http`, `Status` and `Json` are transport failures: the request did not
/// produce a usable JSON document. `Schema` means the document arrived but
/// lacks a field the caller depends on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request failed: HTTP {status} for url ({url})\n{message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("failed to parse API JSON (url={url})")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response shape: {0}")]
    Schema(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("table operation failed: {0}")]
    Frame(#[from] polars::prelude::PolarsError),
}

impl Error {
    /// True for network, HTTP status and body-decoding failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http { .. } | Error::Status { .. } | Error::Json { .. }
        )
    }

    pub(crate) fn missing(field: &str, context: &str) -> Self {
        Error::Schema(format!("missing `{}` in {}", field, context))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// Both APIs answer errors with small JSON documents, but not the same ones:
// Cal-Adapt (Django REST framework) uses {"detail": ...}, GBIF uses
// {"message": ...} or {"error": ...}.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) detail: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

pub(crate) fn format_api_error(status: StatusCode, url: &str, text: &str) -> Error {
    let parsed = serde_json::from_str::<ApiErrorBody>(text).ok();
    let from_body = parsed.as_ref().and_then(|b| {
        b.detail
            .as_deref()
            .or(b.message.as_deref())
            .or(b.error.as_deref())
    });

    let message = match from_body {
        Some(m) => m.to_string(),
        None if status == StatusCode::NOT_FOUND => format!(
            "endpoint not found; check the configured base URL and the series slug\n{}",
            text.trim()
        ),
        None => text.trim().to_string(),
    };

    Error::Status {
        url: url.to_string(),
        status: status.as_u16(),
        message,
    }
}
