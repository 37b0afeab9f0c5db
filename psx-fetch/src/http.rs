//! Blocking HTTP seam.
//!
//! [`HttpClient`] performs exactly one GET and classifies its failure.
//! [`Fetcher`] pairs a client with the retry policy so sources never call
//! the network outside `fetch_with_retry`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use psx_core::config::HttpSettings;
use ureq::ErrorKind as TransportKind;

use crate::cancel::CancelToken;
use crate::error::{ErrorKind, FetchError, RequestError};
use crate::retry::{fetch_with_retry_using, Pause, RetryConfig, ThreadPause};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

pub trait HttpClient: Send + Sync {
    /// One GET; the body on 2xx, a classified error otherwise.
    fn get_text(&self, url: &str) -> Result<String, RequestError>;
}

// ---------------------------------------------------------------------------
// ureq
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(settings: &HttpSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(&settings.user_agent)
            .build();
        Self { agent }
    }
}

impl HttpClient for UreqClient {
    fn get_text(&self, url: &str) -> Result<String, RequestError> {
        tracing::debug!("GET {url}");
        match self.agent.get(url).set("Accept", ACCEPT).call() {
            Ok(response) => response
                .into_string()
                .map_err(|e| classify_body_error(&e, url)),
            Err(ureq::Error::Status(code, _)) => Err(RequestError::from_status(code, url)),
            Err(ureq::Error::Transport(transport)) => Err(classify_transport(&transport, url)),
        }
    }
}

fn classify_transport(transport: &ureq::Transport, url: &str) -> RequestError {
    let kind = match transport.kind() {
        TransportKind::Dns | TransportKind::ConnectionFailed | TransportKind::ProxyConnect => {
            ErrorKind::Connection
        }
        TransportKind::Io => match io_kind(transport) {
            Some(io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => ErrorKind::Timeout,
            _ => ErrorKind::Connection,
        },
        TransportKind::InvalidUrl
        | TransportKind::UnknownScheme
        | TransportKind::InsecureRequestHttpsOnly
        | TransportKind::InvalidProxyUrl
        | TransportKind::ProxyUnauthorized => ErrorKind::Client,
        TransportKind::BadStatus | TransportKind::BadHeader | TransportKind::TooManyRedirects => {
            ErrorKind::Malformed
        }
        _ => ErrorKind::Other,
    };
    RequestError::new(kind, format!("{url}: {transport}"))
}

fn io_kind(transport: &ureq::Transport) -> Option<io::ErrorKind> {
    std::error::Error::source(transport)
        .and_then(|e| e.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}

fn classify_body_error(err: &io::Error, url: &str) -> RequestError {
    let kind = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        io::ErrorKind::InvalidData => ErrorKind::Malformed,
        _ => ErrorKind::Connection,
    };
    RequestError::new(kind, format!("reading body of {url}: {err}"))
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// An [`HttpClient`] wrapped in a retry policy.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    retry: RetryConfig,
    cancel: CancelToken,
    pause: Arc<dyn Pause>,
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClient>, retry: RetryConfig) -> Self {
        Self {
            client,
            retry,
            cancel: CancelToken::new(),
            pause: Arc::new(ThreadPause),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// GET `url`, retried per the policy.
    pub fn get_text(&self, url: &str) -> Result<String, FetchError> {
        fetch_with_retry_using(&self.retry, &self.cancel, self.pause.as_ref(), || {
            self.client.get_text(url)
        })
    }

    /// GET `url` and parse the body. A parse failure counts as an attempt
    /// failure, so a [`ErrorKind::Malformed`] page is surfaced without retry.
    pub fn get_parsed<T, P>(&self, url: &str, parse: P) -> Result<T, FetchError>
    where
        P: Fn(&str) -> Result<T, RequestError>,
    {
        fetch_with_retry_using(&self.retry, &self.cancel, self.pause.as_ref(), || {
            let body = self.client.get_text(url)?;
            parse(&body)
        })
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("retry", &self.retry)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error(agent: &ureq::Agent, url: &str) -> ureq::Transport {
        match agent.get(url).call() {
            Err(ureq::Error::Transport(transport)) => transport,
            other => panic!("expected a transport error, got {other:?}"),
        }
    }

    #[test]
    fn plain_http_on_https_only_agent_is_a_client_error() {
        let agent = ureq::AgentBuilder::new().https_only(true).build();
        let url = "http://127.0.0.1:9/quotes";
        let transport = transport_error(&agent, url);
        assert_eq!(transport.kind(), TransportKind::InsecureRequestHttpsOnly);
        let err = classify_transport(&transport, url);
        assert_eq!(err.kind, ErrorKind::Client);
    }

    #[test]
    fn unknown_scheme_is_not_retried() {
        let client = UreqClient::new(&HttpSettings::default());
        let err = client.get_text("ftp://dps.psx.com.pk/listing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Client);
    }
}
