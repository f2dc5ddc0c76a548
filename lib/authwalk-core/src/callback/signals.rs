use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Out-of-band outcome of an authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// An authorization code reached the redirect URL.
    Code(String),
    /// An authorization error reached the redirect URL.
    Error(String),
}

/// Writing half of the signal channels, held by the callback endpoint.
#[derive(Debug, Clone)]
pub struct SignalSender {
    code: mpsc::Sender<String>,
    error: mpsc::Sender<String>,
}

impl SignalSender {
    /// Pushes a code without blocking.
    ///
    /// Returns `false` when the value was dropped because a code is already
    /// pending or nobody listens anymore.
    pub fn deliver_code(&self, code: impl Into<String>) -> bool {
        deliver(&self.code, "code", code.into())
    }

    /// Pushes an error without blocking, see [`deliver_code`](Self::deliver_code).
    pub fn deliver_error(&self, error: impl Into<String>) -> bool {
        deliver(&self.error, "error", error.into())
    }

    /// Forwards the non-empty `code` and `error` values of a callback request.
    pub fn observe(&self, code: Option<&str>, error: Option<&str>) {
        if let Some(code) = code.filter(|code| !code.is_empty()) {
            self.deliver_code(code);
        }
        if let Some(error) = error.filter(|error| !error.is_empty()) {
            self.deliver_error(error);
        }
    }
}

fn deliver(sender: &mpsc::Sender<String>, kind: &'static str, value: String) -> bool {
    match sender.try_send(value) {
        Ok(()) => {
            debug!(kind, "signal delivered");
            true
        }
        Err(TrySendError::Full(value)) => {
            warn!(kind, %value, "signal dropped, a previous one is still pending");
            false
        }
        Err(TrySendError::Closed(value)) => {
            warn!(kind, %value, "signal dropped, no receiver");
            false
        }
    }
}

/// Reading half of the signal channels: one single-slot queue for codes,
/// one for errors.
#[derive(Debug)]
pub struct AuthorizationSignals {
    code: mpsc::Receiver<String>,
    error: mpsc::Receiver<String>,
}

impl AuthorizationSignals {
    /// Creates a connected sender/receiver pair, each queue holding one value.
    pub fn channel() -> (SignalSender, Self) {
        let (code_tx, code_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let sender = SignalSender {
            code: code_tx,
            error: error_tx,
        };
        let signals = Self {
            code: code_rx,
            error: error_rx,
        };
        (sender, signals)
    }

    /// Discards every pending value, returning how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(code) = self.code.try_recv() {
            debug!(%code, "stale code drained");
            drained += 1;
        }
        while let Ok(error) = self.error.try_recv() {
            debug!(%error, "stale error drained");
            drained += 1;
        }
        drained
    }

    /// Waits for the first code or error, `None` once `timeout` elapsed.
    pub async fn wait(&mut self, timeout: Duration) -> Option<Signal> {
        tokio::select! {
            Some(code) = self.code.recv() => Some(Signal::Code(code)),
            Some(error) = self.error.recv() => Some(Signal::Error(error)),
            () = tokio::time::sleep(timeout) => None,
        }
    }
}
