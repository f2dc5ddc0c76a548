//! OAuth client configuration and code exchange.
//!
//! A [`ClientConfig`] describes the client taking part in an
//! authorization-code grant: identifier, secret, authorize/token endpoints,
//! redirect URL and scopes. It builds the URL that starts the grant and, once
//! a code has been delivered to the redirect URL, exchanges it for an
//! [`AccessToken`].
//!
//! # Example
//!
//! ```rust,no_run
//! use authwalk_core::ClientConfigBuilder;
//! # async fn example(code: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let server = url::Url::parse("https://auth.example.com")?;
//! let config = ClientConfigBuilder::for_server("my-client", &server)?
//!     .with_client_secret("my-secret")
//!     .with_redirect_url("https://app.example.com/oauthcallback")
//!     .add_scopes(["user:info", "role:edit:test-project"])
//!     .build()?;
//!
//! let token = config.exchange_code(&reqwest::Client::new(), code).await?;
//! println!("{}", token.authentication());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod token;

pub use self::config::{AUTHORIZE_PATH, ClientConfig, ClientConfigBuilder, TOKEN_PATH};
pub use self::error::OAuthError;
pub use self::token::AccessToken;
