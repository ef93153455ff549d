//! Fetch seam for poll feeds and manual refresh.

use finboard_core::{AdaptedResponse, FeedResult};
use finboard_http::ApiClient;
use futures_util::future::BoxFuture;

/// Something that can fetch a widget's payload.
///
/// Fetches issued by the subscription layer always bypass the cache.
#[cfg_attr(test, mockall::automock)]
pub trait FeedSource: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, FeedResult<AdaptedResponse>>;
}

impl FeedSource for ApiClient {
    fn fetch(&self, url: &str) -> BoxFuture<'static, FeedResult<AdaptedResponse>> {
        let client = self.clone();
        let url = url.to_string();
        Box::pin(async move { client.fetch(&url, false).await })
    }
}
