use std::future::Future;

use http::HeaderValue;
use reqwest::header::AUTHORIZATION;
use reqwest::{Request, Response};
use tracing::debug;

use crate::{Authentication, AuthenticationError, SecureString};

/// Anything able to send a fully built request.
///
/// Implemented for [`reqwest::Client`]; decorators such as
/// [`BasicAuthTransport`] wrap another implementation and expose the same
/// contract.
pub trait SendRequest {
    /// Sends the request and returns the response.
    fn send(&self, request: Request)
    -> impl Future<Output = Result<Response, reqwest::Error>> + Send;
}

impl SendRequest for reqwest::Client {
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        self.execute(request)
    }
}

/// Transport decorator injecting HTTP Basic credentials once they are known.
///
/// Requests pass through untouched until [`set_credentials`](Self::set_credentials)
/// is called with a non-empty username or password; from then on every request
/// carries `Authorization: Basic ...`. Nothing is retried here.
#[derive(Debug)]
pub struct BasicAuthTransport<S> {
    inner: S,
    credentials: Option<Authentication>,
    authorization: Option<HeaderValue>,
}

impl<S> BasicAuthTransport<S> {
    /// Wraps an inner sender, without credentials.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            credentials: None,
            authorization: None,
        }
    }

    /// Sets the credentials applied to every following request.
    ///
    /// Empty username and password clear the credentials.
    ///
    /// # Errors
    ///
    /// Fails if the credentials cannot be encoded in a header.
    pub fn set_credentials(
        &mut self,
        username: impl Into<String>,
        password: impl Into<SecureString>,
    ) -> Result<(), AuthenticationError> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() && password.is_empty() {
            self.credentials = None;
            self.authorization = None;
            return Ok(());
        }

        let credentials = Authentication::Basic { username, password };
        let (_, value) = credentials.to_header()?;

        debug!(%credentials, "applying credentials to following requests");
        self.credentials = Some(credentials);
        self.authorization = Some(value);
        Ok(())
    }

    /// Returns `true` once credentials are applied.
    pub fn has_credentials(&self) -> bool {
        self.authorization.is_some()
    }

    /// Returns the username of the applied credentials.
    pub fn username(&self) -> Option<&str> {
        match &self.credentials {
            Some(Authentication::Basic { username, .. }) => Some(username.as_str()),
            _ => None,
        }
    }

    /// Returns the wrapped sender.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> SendRequest for BasicAuthTransport<S>
where
    S: SendRequest + Sync,
{
    fn send(
        &self,
        mut request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        if let Some(value) = &self.authorization {
            request.headers_mut().insert(AUTHORIZATION, value.clone());
        }
        self.inner.send(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::Method;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingSender {
        seen: Mutex<Vec<Option<String>>>,
    }

    impl RecordingSender {
        fn seen(&self) -> Vec<Option<String>> {
            self.seen.lock().expect("not poisoned").clone()
        }
    }

    impl SendRequest for RecordingSender {
        fn send(
            &self,
            request: Request,
        ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
            let authorization = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string);
            self.seen.lock().expect("not poisoned").push(authorization);
            std::future::ready(Ok(Response::from(http::Response::new(""))))
        }
    }

    fn request() -> Request {
        let url = "http://127.0.0.1:8443/oauth/authorize".parse().expect("url");
        Request::new(Method::GET, url)
    }

    #[tokio::test]
    async fn should_pass_requests_through_until_credentials_are_set() {
        let mut transport = BasicAuthTransport::new(RecordingSender::default());

        transport.send(request()).await.expect("sent");
        transport
            .set_credentials("harold", "any-pass")
            .expect("valid credentials");
        transport.send(request()).await.expect("sent");
        transport.send(request()).await.expect("sent");

        assert_eq!(
            transport.inner().seen(),
            vec![
                None,
                Some("Basic aGFyb2xkOmFueS1wYXNz".to_string()),
                Some("Basic aGFyb2xkOmFueS1wYXNz".to_string()),
            ]
        );
        assert_eq!(transport.username(), Some("harold"));
    }

    #[tokio::test]
    async fn should_not_touch_requests_with_empty_credentials() {
        let mut transport = BasicAuthTransport::new(RecordingSender::default());
        transport.set_credentials("", "").expect("empty credentials");

        transport.send(request()).await.expect("sent");

        assert!(!transport.has_credentials());
        assert_eq!(transport.inner().seen(), vec![None]);
    }

    #[test]
    fn should_reject_username_with_colon() {
        let mut transport = BasicAuthTransport::new(RecordingSender::default());

        let result = transport.set_credentials("har:old", "pass");

        assert!(matches!(
            result,
            Err(AuthenticationError::InvalidUsername { .. })
        ));
        assert!(!transport.has_credentials());
    }
}
