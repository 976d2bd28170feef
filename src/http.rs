//! Small helpers shared by the HTTP clients.

use url::Url;

/// Append query parameters, percent-encoding values.
pub fn with_query(mut url: Url, params: &[(&str, &str)]) -> Url {
    url.query_pairs_mut().extend_pairs(params);
    url
}
