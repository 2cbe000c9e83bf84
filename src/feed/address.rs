use url::Url;

use crate::error::FeedError;

/// Build `<base>/<feed_path>/markets/<market_id>[?token=<token>]`.
///
/// The market id is percent-encoded as a single path segment; a blank token is
/// treated as absent.
pub fn subscription_url(
    base_url: &str,
    feed_path: &str,
    market_id: &str,
    token: Option<&str>,
) -> Result<Url, FeedError> {
    if market_id.trim().is_empty() {
        return Err(FeedError::Config("market id is empty".to_string()));
    }

    let mut url = Url::parse(base_url.trim())?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| FeedError::Config(format!("'{}' cannot be a base URL", base_url)))?;
        segments
            .pop_if_empty()
            .extend(feed_path.split('/').filter(|s| !s.is_empty()))
            .push("markets")
            .push(market_id.trim());
    }

    if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("token", token);
    }

    Ok(url)
}

/// Address safe for logs: the query (which may carry the token) is dropped.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
