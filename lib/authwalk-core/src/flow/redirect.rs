use http::header::LOCATION;
use http::{HeaderMap, StatusCode};
use tracing::debug;
use url::Url;

/// Consecutive redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// A redirect the driver cannot follow.
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub enum RedirectError {
    /// A redirect status without `Location` header.
    #[display("Redirect {status} without Location header")]
    MissingLocation {
        /// The redirect status.
        status: StatusCode,
    },

    /// The `Location` header is not a URL, even relative to the response URL.
    #[display("Invalid redirect location {location:?}: {source}")]
    InvalidLocation {
        /// The header value, lossily decoded.
        location: String,
        /// The resolution error.
        source: url::ParseError,
    },

    /// The chain of redirects exceeds [`MAX_REDIRECTS`].
    #[display("More than {MAX_REDIRECTS} redirects in a row")]
    TooMany,
}

/// A redirect answered by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    /// Status of the response that asked for the redirect.
    pub status: StatusCode,
    /// Target of the redirect, resolved against the response URL.
    pub url: Url,
}

impl RedirectHop {
    /// Returns `true` if the method and body are replayed on this hop
    /// (`307` and `308`); other redirects continue with a bodiless `GET`.
    pub fn preserves_method(&self) -> bool {
        matches!(
            self.status,
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
        )
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Counter of the redirects followed in a row.
///
/// The HTTP client never follows redirects itself: each hop comes back to
/// the driver, which issues it like any other request, so the credentials
/// and the CSRF header are applied on every hop whatever its origin.
#[derive(Debug, Default)]
pub struct RedirectChain {
    hops: usize,
}

impl RedirectChain {
    /// Inspects a response: the hop to follow for a redirect, `None` otherwise.
    ///
    /// Any other response ends the current chain.
    ///
    /// # Errors
    ///
    /// Fails on a missing or invalid `Location` and past [`MAX_REDIRECTS`].
    pub fn next(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
        response_url: &Url,
    ) -> Result<Option<RedirectHop>, RedirectError> {
        if !is_redirect(status) {
            self.hops = 0;
            return Ok(None);
        }

        self.hops += 1;
        if self.hops > MAX_REDIRECTS {
            return Err(RedirectError::TooMany);
        }

        let location = headers
            .get(LOCATION)
            .ok_or(RedirectError::MissingLocation { status })?;
        let location = String::from_utf8_lossy(location.as_bytes());
        let url = response_url
            .join(&location)
            .map_err(|source| RedirectError::InvalidLocation {
                location: location.to_string(),
                source,
            })?;

        debug!(%status, %url, hops = self.hops, "following redirect");
        Ok(Some(RedirectHop { status, url }))
    }
}
