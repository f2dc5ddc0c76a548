//! Driver walking an interactive OAuth authorization-code grant.
//!
//! An [`OAuthFlow`] starts at the authorize URL of a [`ClientConfig`] and
//! behaves like a minimal browser:
//!
//! - a `401 Unauthorized` is answered once with the configured Basic
//!   credentials, which then apply to every following request;
//! - redirects are followed by the driver itself, hop by hop, so every hop
//!   carries the credentials and the CSRF header;
//! - a page holding a single `<form>` is submitted;
//! - a page without form ends the walk, and the driver waits for the
//!   callback endpoint to report a `code` or an `error`.
//!
//! Every observed step is recorded in a [`Trace`], compared with an expected
//! sequence of literal steps by [`FlowOutcome::verify`].
//!
//! # Example
//!
//! ```rust,no_run
//! use authwalk_core::ClientConfigBuilder;
//! use authwalk_core::callback::CallbackServer;
//! use authwalk_core::flow::{FlowConfig, OAuthFlow};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut callback = CallbackServer::start().await?;
//! let server = url::Url::parse("http://127.0.0.1:8443")?;
//! let client = ClientConfigBuilder::for_server("my-client", &server)?
//!     .with_client_secret("my-secret")
//!     .with_redirect_url(callback.redirect_url().as_str())
//!     .add_scope("user:info")
//!     .build()?;
//!
//! let flow = OAuthFlow::new(client, FlowConfig::default().with_challenge_credentials("harold", "any-pass"));
//! let outcome = flow
//!     .run_expecting(
//!         callback.signals_mut(),
//!         &[
//!             "GET /oauth/authorize",
//!             "received challenge",
//!             "GET /oauth/authorize",
//!             "redirect to /oauth/authorize/approve",
//!             "form",
//!             "POST /oauth/authorize/approve",
//!             "redirect to /oauth/authorize",
//!             "redirect to /oauthcallback",
//!             "code",
//!         ],
//!     )
//!     .await?;
//! println!("code: {:?}", outcome.code());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use headers::{ContentType, HeaderMapExt};
use http::{Method, StatusCode};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Body, Request};
use tracing::{debug, info};
use url::Url;

use crate::callback::{AuthorizationSignals, Signal};
use crate::oauth::ClientConfig;

mod config;
pub use self::config::{
    Credentials, DEFAULT_CSRF_HEADER, DEFAULT_CSRF_TOKEN, DEFAULT_SIGNAL_TIMEOUT, FlowConfig,
};

mod dump;
pub use self::dump::{BODY_MAX_LENGTH, ResponseDump};

mod error;
pub use self::error::FlowError;

mod form;
pub use self::form::{FormError, FormField, FormSubmission, HtmlForm, extract_forms};

mod redirect;
pub use self::redirect::{MAX_REDIRECTS, RedirectChain, RedirectError, RedirectHop};

mod trace;
pub use self::trace::{Operation, Trace};

mod transport;
pub use self::transport::{BasicAuthTransport, SendRequest};

/// How a run ended.
#[derive(Debug, Clone)]
pub enum Terminal {
    /// The callback endpoint received an authorization code.
    Code(String),
    /// The callback endpoint received an authorization error.
    Error(String),
    /// The server answered `400 Bad Request` while one was expected.
    BadRequest(ResponseDump),
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    trace: Trace,
    terminal: Terminal,
}

impl FlowOutcome {
    /// Operations recorded during the run.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// How the run ended.
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// The received authorization code, if any.
    pub fn code(&self) -> Option<&str> {
        match &self.terminal {
            Terminal::Code(code) => Some(code),
            _ => None,
        }
    }

    /// The received authorization error, if any.
    pub fn error(&self) -> Option<&str> {
        match &self.terminal {
            Terminal::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if the run stopped on an expected `400 Bad Request`.
    pub fn is_bad_request(&self) -> bool {
        matches!(self.terminal, Terminal::BadRequest(_))
    }

    /// Checks the trace against `expected`, step by step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::TraceMismatch`] unless both sequences are equal.
    pub fn verify<S>(self, expected: &[S]) -> Result<Self, FlowError>
    where
        S: AsRef<str>,
    {
        if self.trace.matches(expected) {
            return Ok(self);
        }
        Err(FlowError::TraceMismatch {
            expected: expected.iter().map(|step| step.as_ref().to_string()).collect(),
            trace: self.trace,
        })
    }
}

/// Driver of one client's authorization-code grant.
///
/// Each [`run`](Self::run) starts from scratch: new cookie jar, no
/// credentials, empty trace.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    client: ClientConfig,
    config: FlowConfig,
}

impl OAuthFlow {
    /// Creates a driver.
    pub fn new(client: ClientConfig, config: FlowConfig) -> Self {
        Self { client, config }
    }

    /// The client configuration.
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// The per-run configuration.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Runs the flow then compares its trace with `expected`.
    ///
    /// A run stopped by an expected `400 Bad Request` is returned as is: the
    /// server rejected the request before any step worth comparing.
    ///
    /// # Errors
    ///
    /// Fails like [`run`](Self::run), or with [`FlowError::TraceMismatch`].
    pub async fn run_expecting<S>(
        &self,
        signals: &mut AuthorizationSignals,
        expected: &[S],
    ) -> Result<FlowOutcome, FlowError>
    where
        S: AsRef<str>,
    {
        let outcome = self.run(signals).await?;
        if outcome.is_bad_request() {
            return Ok(outcome);
        }
        outcome.verify(expected)
    }

    /// Walks the flow until the callback reports a code or an error.
    ///
    /// Pending signals are discarded first, so a value left over by a
    /// previous run cannot end this one.
    ///
    /// # Errors
    ///
    /// Fails on any protocol deviation, on transport failures, and when no
    /// signal arrives within [`FlowConfig::signal_timeout`].
    pub async fn run(&self, signals: &mut AuthorizationSignals) -> Result<FlowOutcome, FlowError> {
        let drained = signals.drain();
        if drained > 0 {
            debug!(drained, "discarded stale signals");
        }

        let mut walk = Walk::new(&self.config)?;
        let mut pending = PendingRequest::get(
            self.client
                .authorize_request_url(self.config.state.as_deref()),
        );
        info!(client_id = self.client.client_id(), url = %pending.url, "starting authorization flow");

        let mut redirects = RedirectChain::default();
        let mut redirected = false;
        loop {
            // a redirect hop is traced as such, not as a new request
            if !redirected {
                walk.trace.record(Operation::request(&pending.method, &pending.url));
            }
            redirected = false;
            let request = pending.to_request(&self.config);
            debug!(method = %request.method(), url = %request.url(), "sending request");

            let response = walk
                .transport
                .send(request)
                .await
                .map_err(|source| walk.transport_error(source, &pending.url))?;

            let status = response.status();
            debug!(%status, url = %response.url(), "response received");

            if status == StatusCode::UNAUTHORIZED {
                walk.answer_challenge()?;
                continue;
            }

            match redirects.next(status, response.headers(), response.url()) {
                Ok(Some(hop)) => {
                    walk.trace.record(Operation::redirect_to(&hop.url));
                    pending = pending.follow(hop);
                    redirected = true;
                    continue;
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(FlowError::Redirect {
                        source,
                        trace: walk.trace,
                    });
                }
            }

            if status == StatusCode::BAD_REQUEST && self.config.expect_bad_request {
                let dump = walk.read(response, &pending.url).await?;
                info!(trace = %walk.trace, "flow stopped on expected bad request");
                return Ok(FlowOutcome {
                    trace: walk.trace,
                    terminal: Terminal::BadRequest(dump),
                });
            }

            if status != StatusCode::OK {
                let dump = walk.read(response, &pending.url).await?;
                return Err(FlowError::UnexpectedStatus {
                    status,
                    dump,
                    trace: walk.trace,
                });
            }

            let page_url = response.url().clone();
            let dump = walk.read(response, &page_url).await?;
            let forms = extract_forms(dump.body());
            match forms.as_slice() {
                [] => break,
                [form] => {
                    let submission = form
                        .submission(&page_url, self.config.form_credentials.as_ref())
                        .and_then(|submission| PendingRequest::try_from(&submission));
                    pending = match submission {
                        Ok(next) => next,
                        Err(source) => {
                            return Err(FlowError::FormSubmission {
                                source,
                                trace: walk.trace,
                            });
                        }
                    };
                    walk.trace.record(Operation::Form);
                }
                _ => {
                    return Err(FlowError::FormCount {
                        count: forms.len(),
                        dump,
                        trace: walk.trace,
                    });
                }
            }
        }

        let mut trace = walk.trace;
        let terminal = match signals.wait(self.config.signal_timeout).await {
            Some(Signal::Code(code)) => {
                trace.record(Operation::Code);
                Terminal::Code(code)
            }
            Some(Signal::Error(error)) => {
                trace.record(Operation::Error(error.clone()));
                Terminal::Error(error)
            }
            None => {
                return Err(FlowError::Timeout {
                    timeout: self.config.signal_timeout,
                    trace,
                });
            }
        };
        info!(%trace, "authorization flow completed");

        Ok(FlowOutcome { trace, terminal })
    }
}

/// State of a single run.
struct Walk<'a> {
    config: &'a FlowConfig,
    jar: Arc<Jar>,
    transport: BasicAuthTransport<reqwest::Client>,
    trace: Trace,
}

impl<'a> Walk<'a> {
    fn new(config: &'a FlowConfig) -> Result<Self, FlowError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::none())
            .build()
            .map_err(|source| FlowError::Transport {
                source,
                cookies: "none".to_string(),
                trace: Trace::default(),
            })?;

        Ok(Self {
            config,
            jar,
            transport: BasicAuthTransport::new(client),
            trace: Trace::default(),
        })
    }

    fn answer_challenge(&mut self) -> Result<(), FlowError> {
        let config = self.config;
        let credentials = match &config.challenge_credentials {
            Some(credentials) if !self.transport.has_credentials() => credentials,
            _ => {
                return Err(FlowError::ChallengeRejected {
                    username: self.transport.username().map(ToString::to_string),
                    trace: self.trace.clone(),
                });
            }
        };

        self.transport
            .set_credentials(credentials.username.clone(), credentials.password.clone())
            .map_err(|source| FlowError::Credentials {
                source,
                trace: self.trace.clone(),
            })?;
        self.trace.record(Operation::ReceivedChallenge);
        Ok(())
    }

    async fn read(
        &self,
        response: reqwest::Response,
        url: &Url,
    ) -> Result<ResponseDump, FlowError> {
        ResponseDump::read(response)
            .await
            .map_err(|source| self.transport_error(source, url))
    }

    fn transport_error(&self, source: reqwest::Error, url: &Url) -> FlowError {
        let cookies = self
            .jar
            .cookies(url)
            .and_then(|value| value.to_str().map(ToString::to_string).ok())
            .unwrap_or_else(|| "none".to_string());
        FlowError::Transport {
            source,
            cookies,
            trace: self.trace.clone(),
        }
    }
}

/// The logical request the driver issues next.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRequest {
    method: Method,
    url: Url,
    form_body: Option<String>,
}

impl PendingRequest {
    fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form_body: None,
        }
    }

    /// Request issued for a redirect hop.
    fn follow(self, hop: RedirectHop) -> Self {
        if hop.preserves_method() {
            Self { url: hop.url, ..self }
        } else {
            Self::get(hop.url)
        }
    }

    fn to_request(&self, config: &FlowConfig) -> Request {
        let mut request = Request::new(self.method.clone(), self.url.clone());
        let headers = request.headers_mut();
        headers.insert(config.csrf_header.clone(), config.csrf_token.clone());
        if let Some(body) = &self.form_body {
            headers.typed_insert(ContentType::form_url_encoded());
            *request.body_mut() = Some(Body::from(body.clone()));
        }
        request
    }
}

impl TryFrom<&FormSubmission> for PendingRequest {
    type Error = FormError;

    fn try_from(submission: &FormSubmission) -> Result<Self, Self::Error> {
        Ok(Self {
            method: submission.method.clone(),
            url: submission.target(),
            form_body: submission.body()?,
        })
    }
}
