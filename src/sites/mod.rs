//! Site profiles: how each catalog lays out its listings and item pages
//!
//! A profile turns raw markup into listing links and medicine records. Profiles
//! are pure: they never fetch, and a missing optional section becomes `None`
//! rather than an error.

mod medeasy;
mod medex;
pub mod parser;

pub use medeasy::MedeasyProfile;
pub use medex::MedexProfile;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Currency assumed when a page does not state one
pub const DEFAULT_CURRENCY: &str = "BDT";

/// Supported catalog layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    Medex,
    Medeasy,
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medex => write!(f, "medex"),
            Self::Medeasy => write!(f, "medeasy"),
        }
    }
}

/// Errors raised while extracting a record from an item page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing mandatory field '{field}' at {url}")]
    MissingField { field: &'static str, url: String },

    #[error("invalid item URL '{0}'")]
    InvalidUrl(String),
}

/// One listing page, reduced to what the walker needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Absolute item URLs in page order, without duplicates
    pub item_urls: Vec<String>,

    /// Last page number advertised by the pagination widget
    pub last_page: Option<u32>,
}

/// A medicine as extracted from its item page
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedMedicine {
    pub source_url: String,
    pub product_code: Option<String>,
    pub name: String,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    pub manufacturer: Option<String>,
    pub strength: Option<String>,
    pub dosage_form: Option<String>,
    pub pack_size: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub indications: Option<String>,
    pub contraindications: Option<String>,
    pub side_effects: Option<String>,
    pub dosage_instructions: Option<String>,
    pub storage_conditions: Option<String>,
    /// Category name or slug as shown on the page
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// Everything else worth keeping (price details, extra sections, page metadata)
    pub raw_data: serde_json::Value,
}

impl ScrapedMedicine {
    pub fn new(source_url: String, name: String) -> Self {
        Self {
            source_url,
            product_code: None,
            name,
            generic_name: None,
            brand_name: None,
            manufacturer: None,
            strength: None,
            dosage_form: None,
            pack_size: None,
            price: None,
            currency: None,
            description: None,
            indications: None,
            contraindications: None,
            side_effects: None,
            dosage_instructions: None,
            storage_conditions: None,
            category: None,
            image_url: None,
            raw_data: serde_json::Value::Null,
        }
    }

    /// Deduplication key: the product code, or the source URL when none was found
    pub fn external_key(&self) -> String {
        match &self.product_code {
            Some(code) if !code.trim().is_empty() => code.trim().to_string(),
            _ => self.source_url.clone(),
        }
    }

    pub fn currency_or_default(&self) -> &str {
        self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
    }
}

/// Layout knowledge for one catalog site
pub trait SiteProfile: Send + Sync {
    fn kind(&self) -> SiteKind;

    /// URL of listing page `page` (1-based)
    fn listing_url(&self, page: u32) -> String;

    /// Extracts item links and the advertised page count from a listing page
    fn parse_listing(&self, html: &str) -> ListingPage;

    /// Extracts a medicine record from an item page
    ///
    /// # Arguments
    ///
    /// * `html` - Item page markup
    /// * `url` - The URL the markup was fetched from
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapedMedicine)` - Record with every section that was present
    /// * `Err(ExtractError)` - A mandatory field was missing
    fn extract(&self, html: &str, url: &str) -> Result<ScrapedMedicine, ExtractError>;

    /// Returns true for a "not found" page served with a success status
    fn is_not_found(&self, html: &str) -> bool {
        parser::looks_like_not_found(&scraper::Html::parse_document(html))
    }
}

/// Builds the profile for a configured site
pub fn build_profile(kind: SiteKind, base_url: &str) -> Result<Box<dyn SiteProfile>, url::ParseError> {
    let base_url = Url::parse(base_url)?;
    Ok(match kind {
        SiteKind::Medex => Box::new(MedexProfile::new(base_url)),
        SiteKind::Medeasy => Box::new(MedeasyProfile::new(base_url)),
    })
}
