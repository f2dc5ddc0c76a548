use std::fmt;

use http::Method;
use tracing::debug;
use url::Url;

/// A single protocol step observed while walking a flow.
///
/// The `Display` form is the literal step string used in expected traces.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Operation {
    /// A request issued by the driver: `"GET /oauth/authorize"`.
    #[display("{method} {path}")]
    Request {
        /// HTTP method of the request.
        method: Method,
        /// Path of the request URL, without query.
        path: String,
    },

    /// The server answered `401 Unauthorized`.
    #[display("received challenge")]
    ReceivedChallenge,

    /// A redirect hop followed by the driver: `"redirect to /oauth/authorize/approve"`.
    #[display("redirect to {_0}")]
    RedirectTo(String),

    /// A single HTML form was found and will be submitted.
    #[display("form")]
    Form,

    /// The callback endpoint received an authorization code.
    #[display("code")]
    Code,

    /// The callback endpoint received an authorization error.
    #[display("error:{_0}")]
    Error(String),
}

impl Operation {
    pub(crate) fn request(method: &Method, url: &Url) -> Self {
        Self::Request {
            method: method.clone(),
            path: url.path().to_string(),
        }
    }

    pub(crate) fn redirect_to(url: &Url) -> Self {
        Self::RedirectTo(url.path().to_string())
    }
}

/// Ordered, append-only record of the operations of one flow run.
///
/// ```rust
/// use authwalk_core::flow::{Operation, Trace};
///
/// let trace = Trace::from(vec![Operation::ReceivedChallenge, Operation::Form, Operation::Code]);
/// assert!(trace.matches(&["received challenge", "form", "code"]));
/// assert!(!trace.matches(&["received challenge", "code"]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_more::Deref)]
pub struct Trace(Vec<Operation>);

impl Trace {
    pub(crate) fn record(&mut self, operation: Operation) {
        debug!(%operation, step = self.0.len(), "flow operation");
        self.0.push(operation);
    }

    /// Returns the literal step strings.
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Returns `true` if the trace equals `expected` exactly: same length,
    /// same order, same literal values.
    pub fn matches<S>(&self, expected: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        self.0.len() == expected.len()
            && self
                .0
                .iter()
                .zip(expected)
                .all(|(operation, step)| {
                    let step: &str = step.as_ref();
                    operation.to_string() == step
                })
    }
}

impl From<Vec<Operation>> for Trace {
    fn from(operations: Vec<Operation>) -> Self {
        Self(operations)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_strings()).finish()
    }
}
