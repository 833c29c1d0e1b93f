//! HTTP retrieval of the timetable iCalendar feed.
//!
//! A thin reqwest wrapper with one job: fetch the feed URL and hand back
//! its text, failing loudly when the URL serves anything that is not an
//! iCalendar document (the usual failure is a login page).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Default request timeout for feed downloads.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How much of a non-calendar body to echo back in the error.
const SNIPPET_LEN: usize = 200;

/// Feed retrieval errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request itself failed (DNS, TLS, timeout, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("feed URL returned status {status}")]
    Status { status: u16 },
    /// The body does not look like an iCalendar document. Usually a login
    /// page or a wrong URL.
    #[error("downloaded content is not iCalendar (login page or wrong URL?): {snippet:?}")]
    NotCalendar { snippet: String },
}

/// Feed download client.
///
/// Safe to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(FeedError::ClientBuild)?;
        Ok(Self { http })
    }

    /// Downloads the feed and returns its text.
    pub async fn fetch(&self, url: &str) -> Result<String, FeedError> {
        tracing::debug!(url, "downloading calendar feed");
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        check_looks_like_calendar(&body)?;
        Ok(body)
    }
}

/// Rejects bodies without a VCALENDAR marker, echoing a short single-line
/// snippet so the user can see what the URL actually served.
fn check_looks_like_calendar(body: &str) -> Result<(), FeedError> {
    if body.contains("BEGIN:VCALENDAR") {
        return Ok(());
    }
    let snippet: String = body
        .trim()
        .replace('\n', " ")
        .chars()
        .take(SNIPPET_LEN)
        .collect();
    Err(FeedError::NotCalendar { snippet })
}
