//! Local endpoint receiving the redirect at the end of an authorization request.
//!
//! The authorization server ends a grant by redirecting the user agent to the
//! client's redirect URL with either a `code` or an `error` query parameter.
//! [`CallbackServer`] binds a random localhost port, accepts that redirect on
//! any path and forwards the values to [`AuthorizationSignals`], where the
//! flow driver waits for them.
//!
//! ```rust,no_run
//! use authwalk_core::callback::CallbackServer;
//!
//! # async fn example() -> Result<(), authwalk_core::callback::CallbackError> {
//! let server = CallbackServer::start().await?;
//! println!("register {} as redirect URL", server.redirect_url());
//! # Ok(())
//! # }
//! ```

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use backon::{ExponentialBuilder, Retryable};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use url::Url;

mod signals;
pub use self::signals::{AuthorizationSignals, Signal, SignalSender};

/// Path of the redirect URL exposed by default.
pub const DEFAULT_CALLBACK_PATH: &str = "/oauthcallback";

/// Errors raised while starting a [`CallbackServer`].
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum CallbackError {
    /// The listener cannot be bound or configured.
    #[display("I/O error: {_0}")]
    Io(std::io::Error),

    /// The redirect URL cannot be built from the bound address.
    #[display("Invalid callback URL: {_0}")]
    Url(url::ParseError),

    /// The server did not accept connections in time.
    #[from(ignore)]
    #[display("Callback server not ready after {attempts} attempts")]
    NotReady {
        /// Number of connection attempts.
        attempts: usize,
    },
}

/// Settings of a [`CallbackServer`].
#[derive(Debug, Clone)]
pub struct CallbackServerConfig {
    /// Path of the exposed redirect URL. Every path is accepted anyway.
    pub callback_path: String,

    /// Minimum delay between readiness probes.
    pub min_backoff_delay: Duration,

    /// Maximum delay between readiness probes.
    pub max_backoff_delay: Duration,

    /// Add jitter to the probe delays.
    pub backoff_jitter: bool,

    /// Maximum number of readiness probes.
    pub max_retry_attempts: usize,
}

impl Default for CallbackServerConfig {
    fn default() -> Self {
        Self {
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            min_backoff_delay: Duration::from_millis(10),
            max_backoff_delay: Duration::from_secs(1),
            backoff_jitter: true,
            max_retry_attempts: 10,
        }
    }
}

/// A running callback endpoint, aborted on drop.
#[derive(Debug)]
pub struct CallbackServer {
    local_addr: SocketAddr,
    redirect_url: Url,
    signals: AuthorizationSignals,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Starts a server with the default settings.
    ///
    /// # Errors
    ///
    /// See [`start_with`](Self::start_with).
    pub async fn start() -> Result<Self, CallbackError> {
        Self::start_with(CallbackServerConfig::default()).await
    }

    /// Starts a server on a random localhost port and waits until it accepts
    /// connections.
    ///
    /// # Errors
    ///
    /// Fails if the port cannot be bound or the server never becomes reachable.
    pub async fn start_with(config: CallbackServerConfig) -> Result<Self, CallbackError> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;

        let redirect_url = Url::parse(&format!("http://{local_addr}"))?.join(&config.callback_path)?;

        let (sender, signals) = AuthorizationSignals::channel();
        let app = Router::new().fallback(receive).with_state(sender);
        let handle = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                error!(?error, "callback server failed");
            }
        });

        let server = Self {
            local_addr,
            redirect_url,
            signals,
            handle: Some(handle),
        };

        if !wait_until_ready(local_addr, &config).await {
            return Err(CallbackError::NotReady {
                attempts: config.max_retry_attempts,
            });
        }
        debug!(redirect_url = %server.redirect_url, "callback server ready");

        Ok(server)
    }

    /// Address the server listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirect URL to register for the client.
    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    /// Signals fed by the received redirects.
    pub fn signals_mut(&mut self) -> &mut AuthorizationSignals {
        &mut self.signals
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn wait_until_ready(local_addr: SocketAddr, config: &CallbackServerConfig) -> bool {
    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(config.min_backoff_delay)
        .with_max_delay(config.max_backoff_delay)
        .with_max_times(config.max_retry_attempts);
    if config.backoff_jitter {
        backoff = backoff.with_jitter();
    }

    let probe = || async move { tokio::net::TcpStream::connect(local_addr).await };

    probe
        .retry(backoff)
        .notify(|err, delay| debug!(?err, ?delay, %local_addr, "callback server not ready yet"))
        .await
        .is_ok()
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn receive(
    State(sender): State<SignalSender>,
    Query(params): Query<CallbackParams>,
) -> &'static str {
    debug!(code = ?params.code, error = ?params.error, "callback received");
    sender.observe(params.code.as_deref(), params.error.as_deref());
    "OK"
}
