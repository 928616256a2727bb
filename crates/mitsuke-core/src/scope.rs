//! Cancellation tied to the lifetime of a view.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Result of a future run under a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Scoped<T> {
    Done(T),
    /// The scope was reset or dropped; the value was discarded.
    Cancelled,
}

/// Owns the cancellation token of one view.
///
/// `reset` is called when the view's query changes, and dropping the scope
/// tears the view down. Both cancel every fetch started under the old token.
#[derive(Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for fetches started now.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel everything in flight and start over with a fresh token.
    pub fn reset(&mut self) -> CancellationToken {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn run<T>(&self, fut: impl Future<Output = T>) -> Scoped<T> {
        scoped(&self.token, fut).await
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `fut` unless `token` fires first. A value that arrives after the
/// token fired is discarded.
pub async fn scoped<T>(token: &CancellationToken, fut: impl Future<Output = T>) -> Scoped<T> {
    let value = tokio::select! {
        biased;
        _ = token.cancelled() => return Scoped::Cancelled,
        value = fut => value,
    };
    if token.is_cancelled() {
        Scoped::Cancelled
    } else {
        Scoped::Done(value)
    }
}
