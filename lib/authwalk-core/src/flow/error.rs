use std::time::Duration;

use http::StatusCode;

use super::dump::ResponseDump;
use super::form::FormError;
use super::redirect::RedirectError;
use super::trace::Trace;
use crate::AuthenticationError;

/// Errors ending a flow run.
///
/// Every variant carries the [`Trace`] accumulated up to the failure, so a
/// failing run can always be compared with the expected sequence.
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub enum FlowError {
    /// A response had a status other than `200` (or an expected `400`).
    #[display("Unexpected status {status}, trace: {trace}\n{dump}")]
    UnexpectedStatus {
        /// The received status.
        status: StatusCode,
        /// The full response.
        dump: ResponseDump,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// A page contained more than one form.
    #[display("Expected at most one form, found {count}, trace: {trace}\n{dump}")]
    FormCount {
        /// Number of forms in the page.
        count: usize,
        /// The page holding the forms.
        dump: ResponseDump,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// The single form of a page cannot be submitted.
    #[display("Cannot submit form: {source}, trace: {trace}")]
    FormSubmission {
        /// Why the form cannot be submitted.
        source: FormError,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// A redirect cannot be followed.
    #[display("Cannot follow redirect: {source}, trace: {trace}")]
    Redirect {
        /// Why the redirect cannot be followed.
        source: RedirectError,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// The server challenged again after credentials were applied.
    #[display("Challenge rejected for {}, trace: {trace}", username.as_deref().unwrap_or("<no credentials>"))]
    ChallengeRejected {
        /// Username of the rejected credentials, if any were configured.
        username: Option<String>,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// The challenge credentials cannot be encoded.
    #[display("Invalid challenge credentials: {source}, trace: {trace}")]
    Credentials {
        /// The encoding error.
        source: AuthenticationError,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// Neither a code nor an error was delivered in time.
    #[display("No code or error received within {timeout:?}, trace: {trace}")]
    Timeout {
        /// The elapsed wait.
        timeout: Duration,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// The request could not be sent or its response could not be read.
    #[display("Transport error: {source} (cookies: {cookies}), trace: {trace}")]
    Transport {
        /// The underlying client error.
        source: reqwest::Error,
        /// Cookies held for the current URL, `none` when empty.
        cookies: String,
        /// Operations recorded so far.
        trace: Trace,
    },

    /// The run completed with a trace other than the expected one.
    #[display("Trace mismatch\n  expected: {expected:?}\n    actual: {trace}")]
    TraceMismatch {
        /// The expected operations.
        expected: Vec<String>,
        /// The actual operations.
        trace: Trace,
    },
}

impl FlowError {
    /// Operations recorded before the failure.
    pub fn trace(&self) -> &Trace {
        match self {
            Self::UnexpectedStatus { trace, .. }
            | Self::FormCount { trace, .. }
            | Self::FormSubmission { trace, .. }
            | Self::Redirect { trace, .. }
            | Self::ChallengeRejected { trace, .. }
            | Self::Credentials { trace, .. }
            | Self::Timeout { trace, .. }
            | Self::Transport { trace, .. }
            | Self::TraceMismatch { trace, .. } => trace,
        }
    }

    /// The response attached to status and form-count failures.
    pub fn dump(&self) -> Option<&ResponseDump> {
        match self {
            Self::UnexpectedStatus { dump, .. } | Self::FormCount { dump, .. } => Some(dump),
            _ => None,
        }
    }
}
