use std::time::Duration;

use http::{HeaderName, HeaderValue};

use crate::SecureString;

/// Default time the driver waits for the callback endpoint to report a code or an error.
pub const DEFAULT_SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default CSRF header sent on every request.
pub const DEFAULT_CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Default CSRF token value.
pub const DEFAULT_CSRF_TOKEN: HeaderValue = HeaderValue::from_static("1");

/// A username/password pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The username.
    pub username: String,
    /// The password.
    pub password: SecureString,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Per-run configuration of an [`OAuthFlow`](super::OAuthFlow).
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use authwalk_core::flow::FlowConfig;
///
/// let config = FlowConfig::default()
///     .with_challenge_credentials("harold", "any-pass")
///     .with_signal_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.csrf_token, "1");
/// assert!(!config.expect_bad_request);
/// ```
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// How long to wait for a code or an error once the final page is reached.
    pub signal_timeout: Duration,

    /// Name of the CSRF header set on every request.
    pub csrf_header: HeaderName,

    /// Value of the CSRF header.
    pub csrf_token: HeaderValue,

    /// Credentials applied after the first `401` challenge.
    pub challenge_credentials: Option<Credentials>,

    /// Credentials filled into `username`/`password` form fields.
    pub form_credentials: Option<Credentials>,

    /// Treat a `400 Bad Request` as the expected end of the run.
    pub expect_bad_request: bool,

    /// Optional `state` parameter of the authorize request.
    pub state: Option<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            signal_timeout: DEFAULT_SIGNAL_TIMEOUT,
            csrf_header: DEFAULT_CSRF_HEADER,
            csrf_token: DEFAULT_CSRF_TOKEN,
            challenge_credentials: None,
            form_credentials: None,
            expect_bad_request: false,
            state: None,
        }
    }
}

impl FlowConfig {
    /// Sets the credentials used to answer a `401` challenge.
    #[must_use]
    pub fn with_challenge_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecureString>,
    ) -> Self {
        self.challenge_credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the credentials filled into login forms.
    #[must_use]
    pub fn with_form_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecureString>,
    ) -> Self {
        self.form_credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the wait for the code or error signal.
    #[must_use]
    pub fn with_signal_timeout(mut self, timeout: Duration) -> Self {
        self.signal_timeout = timeout;
        self
    }

    /// Sets the CSRF header name and value.
    #[must_use]
    pub fn with_csrf_header(mut self, name: HeaderName, token: HeaderValue) -> Self {
        self.csrf_header = name;
        self.csrf_token = token;
        self
    }

    /// Expects the run to stop on a `400 Bad Request`.
    #[must_use]
    pub fn expecting_bad_request(mut self, expect_bad_request: bool) -> Self {
        self.expect_bad_request = expect_bad_request;
        self
    }

    /// Sets the `state` parameter of the authorize request.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_csrf_token_and_five_seconds() {
        let config = FlowConfig::default();

        assert_eq!(config.signal_timeout, Duration::from_secs(5));
        assert_eq!(config.csrf_header, "x-csrf-token");
        assert_eq!(config.csrf_token, "1");
        assert!(config.challenge_credentials.is_none());
        assert!(config.form_credentials.is_none());
        assert!(!config.expect_bad_request);
        assert!(config.state.is_none());
    }

    #[test]
    fn should_apply_builder_settings() {
        let config = FlowConfig::default()
            .with_challenge_credentials("harold", "any-pass")
            .with_csrf_header(
                HeaderName::from_static("x-xsrf-token"),
                HeaderValue::from_static("abc"),
            )
            .expecting_bad_request(true)
            .with_state("opaque");

        assert_eq!(
            config.challenge_credentials,
            Some(Credentials::new("harold", "any-pass"))
        );
        assert_eq!(config.csrf_header, "x-xsrf-token");
        assert_eq!(config.csrf_token, "abc");
        assert!(config.expect_bad_request);
        assert_eq!(config.state.as_deref(), Some("opaque"));
    }

    #[test]
    fn should_redact_password_in_debug() {
        let credentials = Credentials::new("harold", "any-pass");
        let debug_str = format!("{credentials:?}");
        assert!(!debug_str.contains("any-pass"));
    }
}
