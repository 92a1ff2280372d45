//! Seams between the polling core and the backend.

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::schemas::task::VideoTask;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Returns the full list of tasks owned by the current session.
pub trait StatusFetcher: Send + Sync + 'static {
    fn fetch_tasks(&self) -> BoxFuture<'_, Result<Vec<VideoTask>, ApiError>>;
}

/// Source of the session's remaining generation credits.
pub trait CreditSource: Send + Sync + 'static {
    fn credit_balance(&self) -> BoxFuture<'_, Result<i64, ApiError>>;
}

impl StatusFetcher for ApiClient {
    fn fetch_tasks(&self) -> BoxFuture<'_, Result<Vec<VideoTask>, ApiError>> {
        self.get_tasks().boxed()
    }
}

impl CreditSource for ApiClient {
    fn credit_balance(&self) -> BoxFuture<'_, Result<i64, ApiError>> {
        ApiClient::credit_balance(self).boxed()
    }
}
