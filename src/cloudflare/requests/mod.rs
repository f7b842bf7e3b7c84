pub mod trace;

use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, USER_AGENT},
    Method,
};
use serde::Deserialize;
use std::borrow::Cow;

/// User agent sent with every request, instrumented or not.
pub(crate) const UA: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

/// An uninstrumented request for one of the endpoint's metadata resources.
///
/// These go through [`crate::cloudflare::client::Client`]; bandwidth and
/// latency probes use the socket transport instead.
pub trait Request {
    type Response: for<'de> Deserialize<'de>;

    const METHOD: Method = Method::GET;

    /// Path relative to the endpoint root.
    fn endpoint(&self) -> Cow<'_, str>;

    fn headers(&self) -> HeaderMap {
        HeaderMap::from_iter([
            (USER_AGENT, HeaderValue::from_static(UA)),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ])
    }
}
