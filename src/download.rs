//! Link discovery and per-file retrieval.
//!
//! [`discover_links`] reads the listing page and returns the link targets inside the
//! container element. [`fetch_payloads`] turns those links into a lazy stream that
//! fetches and validates one file at a time, in link order.

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::contract::{Fetcher, Payload, SkipReason, SkippedItem};
use crate::error::{DiscoveryError, FetchError};
use crate::preprocess::validate_markup;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// [`Fetcher`] backed by a `reqwest` client with a request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url = %url, "GET");
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DiscoveryError> {
    Selector::parse(selector).map_err(|e| DiscoveryError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Extracts the `href` of every link inside the first element matching
/// `container_selector`, in document order.
///
/// `page_url` is only used for error messages.
pub fn extract_links(
    html: &str,
    container_selector: &str,
    page_url: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let container = parse_selector(container_selector)?;
    let anchor = parse_selector("a[href]")?;

    let document = Html::parse_document(html);
    let element = document
        .select(&container)
        .next()
        .ok_or_else(|| DiscoveryError::ContainerNotFound {
            url: page_url.to_string(),
            selector: container_selector.to_string(),
        })?;

    Ok(element
        .select(&anchor)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect())
}

/// Fetches the listing page and returns the data file links it advertises.
pub async fn discover_links<F>(fetcher: &F, config: &ScrapeConfig) -> Result<Vec<String>, DiscoveryError>
where
    F: Fetcher + ?Sized,
{
    info!(url = %config.listing_url, "Fetching listing page");
    let html = fetcher
        .fetch_text(&config.listing_url)
        .await
        .map_err(|source| DiscoveryError::Fetch {
            url: config.listing_url.clone(),
            source,
        })?;

    let links = extract_links(&html, &config.container_selector, &config.listing_url)?;
    info!(count = links.len(), "Discovered data file links");
    Ok(links)
}

/// Turns a listing-page link into an absolute URL.
///
/// Absolute links are used as they are. Relative links are appended to `base_url`
/// with exactly one `/` between the two.
pub fn resolve_link(base_url: &str, link: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        link: link.to_string(),
        reason,
    };
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty link".to_string()));
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Ok(url);
    }
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        trimmed.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| invalid(e.to_string()))
}

/// Fetches and validates the file behind one link.
///
/// Any failure is logged as a warning naming the link and returned as a
/// [`SkippedItem`]; callers continue with the next link.
pub async fn fetch_payload<F>(fetcher: &F, base_url: &str, link: String) -> Result<Payload, SkippedItem>
where
    F: Fetcher + ?Sized,
{
    let outcome = async {
        let url = resolve_link(base_url, &link)?.to_string();
        let body = fetcher.fetch_text(&url).await?;
        validate_markup(&body)?;
        Ok::<_, SkipReason>(Payload {
            link: link.clone(),
            url,
            body,
        })
    }
    .await;

    match outcome {
        Ok(payload) => {
            info!(link = %payload.link, bytes = payload.body.len(), "Fetched data file");
            Ok(payload)
        }
        Err(reason) => {
            warn!(link = %link, error = %reason, "Skipping data file");
            Err(SkippedItem { link, reason })
        }
    }
}

/// Lazy, sequential stream of fetch outcomes, one per link and in link order.
///
/// Nothing is requested until the stream is polled, and each request completes
/// before the next one starts.
pub fn fetch_payloads<'a, F>(
    fetcher: &'a F,
    base_url: &'a str,
    links: Vec<String>,
) -> impl Stream<Item = Result<Payload, SkippedItem>> + 'a
where
    F: Fetcher + ?Sized,
{
    stream::iter(links).then(move |link| fetch_payload(fetcher, base_url, link))
}
