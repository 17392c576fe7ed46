use crate::config::selectors::SelectorConfig;
use crate::domain::model::Listing;
use crate::domain::ports::ListingSource;
use crate::utils::error::{Result, WatchError};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

struct CompiledSelectors {
    item: Selector,
    link: Selector,
    link_attribute: String,
    title: Option<Selector>,
    price: Option<Selector>,
    id_attribute: Option<String>,
    empty_marker: Option<Selector>,
}

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| WatchError::InvalidConfigValueError {
        field: field.to_string(),
        value: css.to_string(),
        reason: format!("Invalid CSS selector: {}", e),
    })
}

impl CompiledSelectors {
    fn new(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            item: compile("selectors.item", &config.item)?,
            link: compile("selectors.link", &config.link)?,
            link_attribute: config.link_attribute.clone(),
            title: config
                .title
                .as_deref()
                .map(|css| compile("selectors.title", css))
                .transpose()?,
            price: config
                .price
                .as_deref()
                .map(|css| compile("selectors.price", css))
                .transpose()?,
            id_attribute: config.id_attribute.clone(),
            empty_marker: config
                .empty_marker
                .as_deref()
                .map(|css| compile("selectors.empty_marker", css))
                .transpose()?,
        })
    }
}

/// Scrapes listings out of one HTML page.
///
/// Holds no state between fetches; the HTTP client carries the request
/// timeout and the identifying user agent.
pub struct HtmlListingSource {
    client: Client,
    url: Url,
    selectors: CompiledSelectors,
}

impl HtmlListingSource {
    pub fn new(
        source_url: &str,
        selectors: &SelectorConfig,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let url = Url::parse(source_url).map_err(|e| WatchError::InvalidConfigValueError {
            field: "SOURCE_URL".to_string(),
            value: source_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(8))
            .build()
            .map_err(|e| WatchError::ConfigError {
                message: format!("Cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url,
            selectors: CompiledSelectors::new(selectors)?,
        })
    }

    async fn download(&self) -> Result<String> {
        let fetch_error = |message: String| WatchError::FetchError {
            url: self.url.to_string(),
            message,
        };

        tracing::debug!("Requesting listing page: {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(ACCEPT_LANGUAGE, "en;q=0.8,*;q=0.5")
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        tracing::debug!("Listing page status: {}", status);
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP status {}", status)));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }

    /// Pure parsing step, separated from the download so it can run
    /// without holding a non-`Send` document across an await.
    pub fn parse(&self, html: &str) -> Result<Vec<Listing>> {
        parse_listings(html, &self.url, &self.selectors)
    }
}

fn element_text(scope: &ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|e| e.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

fn parse_listings(html: &str, page_url: &Url, selectors: &CompiledSelectors) -> Result<Vec<Listing>> {
    let document = Html::parse_document(html);

    if let Some(marker) = &selectors.empty_marker {
        if document.select(marker).next().is_some() {
            return Ok(Vec::new());
        }
    }

    let items: Vec<ElementRef> = document.select(&selectors.item).collect();
    if items.is_empty() {
        return Err(WatchError::ParseError {
            message: "no element matched the item selector".to_string(),
        });
    }

    let mut seen_ids = HashSet::new();
    let mut listings = Vec::new();

    for item in &items {
        // 連結可能就在 item 本身上 (例如 <a class="card">)
        let href = item
            .select(&selectors.link)
            .next()
            .and_then(|a| a.value().attr(&selectors.link_attribute))
            .or_else(|| item.value().attr(&selectors.link_attribute));

        let Some(mut link) = href.and_then(|h| page_url.join(h.trim()).ok()) else {
            tracing::debug!("Skipping item without a usable link");
            continue;
        };
        link.set_fragment(None);

        let id = selectors
            .id_attribute
            .as_deref()
            .and_then(|attr| item.value().attr(attr))
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| link.to_string());

        if !seen_ids.insert(id.clone()) {
            continue;
        }

        listings.push(Listing {
            id,
            link: link.to_string(),
            title: selectors.title.as_ref().and_then(|s| element_text(item, s)),
            price: selectors.price.as_ref().and_then(|s| element_text(item, s)),
        });
    }

    if listings.is_empty() {
        return Err(WatchError::ParseError {
            message: format!("{} items matched but none had a link", items.len()),
        });
    }

    Ok(listings)
}

#[async_trait::async_trait]
impl ListingSource for HtmlListingSource {
    async fn fetch(&self) -> Result<Vec<Listing>> {
        let html = self.download().await?;

        match self.parse(&html) {
            Ok(listings) if listings.is_empty() => {
                tracing::info!(url = %self.url, "Source reports no listings");
                Ok(listings)
            }
            Ok(listings) => Ok(listings),
            Err(e @ WatchError::ParseError { .. }) => {
                tracing::warn!(
                    url = %self.url,
                    error = %e,
                    "Page structure not recognised, treating as zero listings"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
