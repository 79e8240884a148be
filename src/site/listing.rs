//! Tag listing pages

use crate::crawler::{FetchError, Fetcher};
use crate::site::Listing;
use crate::storage::{dedup_items, Item, ItemId};
use crate::url::{numeric_param, resolve_url};
use crate::HarvestError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

/// Paginated tag listing addressed by a `{page}` URL template
pub struct TagListing {
    fetcher: Fetcher,
    url_template: String,
    base: Url,
}

impl TagListing {
    pub fn new(fetcher: Fetcher, url_template: impl Into<String>, base: Url) -> Self {
        Self {
            fetcher,
            url_template: url_template.into(),
            base,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        self.url_template.replace("{page}", &page.to_string())
    }
}

#[async_trait]
impl Listing for TagListing {
    async fn enumerate(&self, page: u32) -> Result<Vec<Item>, FetchError> {
        let url = self.page_url(page);
        let html = self.fetcher.fetch(&url).await?;
        Ok(parse_listing(&html, &self.base))
    }
}

/// Extracts details-page links from a listing page
///
/// Only anchors pointing at `DetailsAlbum` with a numeric `g` parameter count.
pub fn parse_listing(html: &str, base: &Url) -> Vec<Item> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("DetailsAlbum") && href.contains("g="))
        .filter_map(|href| {
            let id = numeric_param(href, "g", false)?;
            match resolve_url(base, href) {
                Ok(url) => Some(Item {
                    id: ItemId(id),
                    url,
                }),
                Err(e) => {
                    tracing::debug!("Skipping listing link {}: {}", href, e);
                    None
                }
            }
        })
        .collect()
}

/// Enumerates pages `1..=pages` and deduplicates the result by id
///
/// A failing page is logged and skipped. The run only fails when no page
/// could be read at all.
pub async fn collect_items(listing: &dyn Listing, pages: u32) -> Result<Vec<Item>, HarvestError> {
    let mut all = Vec::new();
    let mut failed_pages = 0u32;

    for page in 1..=pages {
        match listing.enumerate(page).await {
            Ok(items) => {
                tracing::info!("Listing page {} parsed: {} links", page, items.len());
                all.extend(items);
            }
            Err(e) => {
                failed_pages += 1;
                tracing::warn!("Listing page {} skipped: {}", page, e);
            }
        }
    }

    if pages > 0 && failed_pages == pages {
        return Err(HarvestError::Listing(format!(
            "all {} listing pages failed",
            pages
        )));
    }

    let unique = dedup_items(all);
    tracing::info!("Listing found {} unique items", unique.len());
    Ok(unique)
}
