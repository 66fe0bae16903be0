use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the login exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The router signals a successful login with a 302, anything else is
    /// a rejection even when the body looks friendly.
    #[error("login answered {0} instead of a redirect")]
    UnexpectedStatus(StatusCode),
    #[error("no sysauth attribute in the login Set-Cookie headers")]
    CookieNotFound,
}

/// Failures while recovering the node list from the servers page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("node listing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("node table missing from the listing page")]
    Parse,
}

/// Failures of the latency probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("latency check request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("latency check answered with a malformed body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures while switching the global proxy selection.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("global switch request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("global switch answered with a malformed body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("router refused to switch the global proxy: {sid}")]
    Rejected { sid: String },
}

/// Failures while pushing subscription URLs.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("subscription update request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("subscription payload or reply was malformed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("subscription update rejected with code {0}")]
    Code(i64),
}
