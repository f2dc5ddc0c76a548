use std::fmt;

use http::{HeaderMap, StatusCode, Version};

/// Maximum number of body bytes shown when a dump is displayed.
pub const BODY_MAX_LENGTH: usize = 1024;

/// Snapshot of a response, kept for diagnostics.
///
/// Displays like a raw HTTP/1.1 response: status line, headers, blank line,
/// body (truncated to [`BODY_MAX_LENGTH`] bytes).
#[derive(Debug, Clone)]
pub struct ResponseDump {
    version: Version,
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ResponseDump {
    /// Creates a dump from its parts.
    pub fn new(version: Version, status: StatusCode, headers: HeaderMap, body: String) -> Self {
        Self {
            version,
            status,
            headers,
            body,
        }
    }

    /// Consumes a response into a dump.
    ///
    /// # Errors
    ///
    /// Fails if the body cannot be read.
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let version = response.version();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(Self::new(version, status, headers, body))
    }

    /// Status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers of the response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Full body of the response.
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for ResponseDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}\r\n", self.version, self.status)?;
        for (name, value) in &self.headers {
            write!(f, "{name}: {}\r\n", String::from_utf8_lossy(value.as_bytes()))?;
        }
        f.write_str("\r\n")?;

        if self.body.len() > BODY_MAX_LENGTH {
            let mut end = BODY_MAX_LENGTH;
            while !self.body.is_char_boundary(end) {
                end -= 1;
            }
            let head = self.body.get(..end).unwrap_or_default();
            write!(f, "{head}... (truncated)")
        } else {
            f.write_str(&self.body)
        }
    }
}
