//! Listing walker
//!
//! Pages through a site's paginated index one listing page at a time. The walker
//! only produces item URLs; everything per item happens in the coordinator.

use crate::crawler::{FetchError, PageFetcher};
use crate::sites::SiteProfile;
use tokio_util::sync::CancellationToken;

/// Item URLs found on one listing page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingBatch {
    pub page: u32,
    pub url: String,
    pub item_urls: Vec<String>,
}

/// Result of asking the walker for the next listing page
#[derive(Debug)]
pub enum ListingStep {
    /// A listing page was fetched and parsed
    Page(ListingBatch),

    /// The listing page could not be fetched after retries; the walk moves on
    Skipped {
        page: u32,
        url: String,
        error: FetchError,
    },

    /// A stop was requested before the next page was fetched
    Stopped,

    /// No pages remain
    Exhausted,
}

pub struct ListingWalker {
    next_page: u32,
    max_pages: u32,
    finished: bool,
}

impl ListingWalker {
    /// Creates a walker starting at `start_page` (1-based) and never going past
    /// `max_pages`
    pub fn new(start_page: u32, max_pages: u32) -> Self {
        Self {
            next_page: start_page.max(1),
            max_pages,
            finished: false,
        }
    }

    /// Current page cap; lowered once a listing advertises its last page
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Fetches and parses the next listing page
    ///
    /// The stop signal is only observed here, between pages, never while a
    /// request is in flight.
    pub async fn next_page(
        &mut self,
        fetcher: &PageFetcher,
        site: &dyn SiteProfile,
        cancel: &CancellationToken,
    ) -> ListingStep {
        if cancel.is_cancelled() {
            return ListingStep::Stopped;
        }
        if self.finished || self.next_page > self.max_pages {
            return ListingStep::Exhausted;
        }

        let page = self.next_page;
        let url = site.listing_url(page);
        self.next_page += 1;

        let html = match fetcher.fetch_page(&url).await {
            Ok(html) => html,
            Err(error) => return ListingStep::Skipped { page, url, error },
        };

        let listing = site.parse_listing(&html);

        if let Some(last_page) = listing.last_page {
            let capped = last_page.max(page);
            if capped < self.max_pages {
                tracing::debug!(
                    "Listing advertises {} pages, lowering cap from {}",
                    capped,
                    self.max_pages
                );
                self.max_pages = capped;
            }
        }

        if listing.item_urls.is_empty() && page > 1 {
            tracing::info!("Listing page {} is empty, ending walk", page);
            self.finished = true;
            return ListingStep::Exhausted;
        }

        ListingStep::Page(ListingBatch {
            page,
            url,
            item_urls: listing.item_urls,
        })
    }
}
