//! # Authwalk Core
//!
//! Drive interactive OAuth authorization-code flows from tests and check the
//! exact sequence of protocol steps they go through.
//!
//! The crate is made of three parts:
//! - **[`oauth`]** - client configuration, authorize URL and code exchange
//! - **[`callback`]** - a local endpoint receiving the final redirect
//! - **[`flow`]** - the driver following challenges, redirects and forms
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authwalk_core::callback::CallbackServer;
//! use authwalk_core::flow::{FlowConfig, OAuthFlow};
//! use authwalk_core::ClientConfigBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut callback = CallbackServer::start().await?;
//!
//! let server = url::Url::parse("http://127.0.0.1:8443")?;
//! let client = ClientConfigBuilder::for_server("test-client", &server)?
//!     .with_client_secret("test-secret")
//!     .with_redirect_url(callback.redirect_url().as_str())
//!     .add_scope("user:info")
//!     .build()?;
//!
//! let config = FlowConfig::default().with_challenge_credentials("harold", "any-pass");
//! let flow = OAuthFlow::new(client.clone(), config);
//! let outcome = flow.run(callback.signals_mut()).await?;
//! println!("{}", outcome.trace());
//!
//! if let Some(code) = outcome.code() {
//!     let token = client.exchange_code(&reqwest::Client::new(), code).await?;
//!     println!("{}", token.authentication());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Expected traces
//!
//! A trace is compared with literal steps:
//!
//! | Step                     | Meaning                                        |
//! |--------------------------|------------------------------------------------|
//! | `GET <path>`             | request issued by the driver                   |
//! | `POST <path>`            | form submitted by the driver                   |
//! | `received challenge`     | `401` answered with Basic credentials          |
//! | `redirect to <path>`     | redirect hop followed by the driver            |
//! | `form`                   | the page held a single form                    |
//! | `code`                   | the callback endpoint received a code          |
//! | `error:<value>`          | the callback endpoint received an error        |

mod auth;
pub use self::auth::{Authentication, AuthenticationError, SecureString};

pub mod callback;
pub mod flow;
pub mod oauth;

pub use self::callback::{AuthorizationSignals, CallbackServer};
pub use self::flow::{FlowConfig, FlowError, FlowOutcome, OAuthFlow, Terminal, Trace};
pub use self::oauth::{AccessToken, ClientConfig, ClientConfigBuilder, OAuthError};
