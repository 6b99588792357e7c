//! MedEasy (medeasy.health) profile
//!
//! The storefront markup changes often, so every field is read through an
//! ordered list of selectors and the first non-empty match wins.

use crate::sites::parser::{
    collect_links, detect_last_page, extract_title, first_text, meta_description, parse_price,
    resolve_link, select_attr,
};
use crate::sites::{ExtractError, ListingPage, ScrapedMedicine, SiteKind, SiteProfile};
use scraper::Html;
use serde_json::json;
use url::Url;

const NAME: &[&str] = &[
    "h1.product-title",
    "h1.medicine-title",
    ".product-name",
    ".medicine-name",
    "h1",
];
const GENERIC: &[&str] = &[".generic-name", ".generic", r#"[data-field="generic"]"#];
const BRAND: &[&str] = &[".brand-name", ".brand"];
const MANUFACTURER: &[&str] = &[
    ".manufacturer",
    ".company",
    ".company-name",
    r#"[data-field="manufacturer"]"#,
];
const STRENGTH: &[&str] = &[".strength", ".dosage-strength", r#"[data-field="strength"]"#];
const DOSAGE_FORM: &[&str] = &[".dosage-form", ".form", r#"[data-field="form"]"#];
const PACK_SIZE: &[&str] = &[".pack-size", ".package-size", r#"[data-field="pack"]"#];
const PRICE: &[&str] = &[
    ".price",
    ".product-price",
    ".medicine-price",
    r#"[data-field="price"]"#,
];
const DESCRIPTION: &[&str] = &[".description", ".product-description", "#description"];
const INDICATIONS: &[&str] = &[".indications", "#indications"];
const CONTRAINDICATIONS: &[&str] = &[".contraindications", "#contraindications"];
const SIDE_EFFECTS: &[&str] = &[".side-effects", "#side-effects", "#side_effects"];
const DOSAGE: &[&str] = &[".dosage", "#dosage", ".dosage-instructions"];
const STORAGE: &[&str] = &[".storage", "#storage", ".storage-conditions"];
const PRODUCT_CODE: &[&str] = &[".product-code", ".sku", r#"[data-field="code"]"#];
const CATEGORY: &[&str] = &[
    ".category",
    ".product-category",
    ".breadcrumb li:last-child",
];
const IMAGE: &[&str] = &[
    ".product-image img",
    ".medicine-image img",
    "img.product-image",
    r#"img[src*="/_next/image"]"#,
];

pub struct MedeasyProfile {
    base_url: Url,
}

impl MedeasyProfile {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

impl SiteProfile for MedeasyProfile {
    fn kind(&self) -> SiteKind {
        SiteKind::Medeasy
    }

    fn listing_url(&self, page: u32) -> String {
        let mut url = self.base_url.clone();
        url.set_path("/medicines");
        if page > 1 {
            url.set_query(Some(&format!("page={}", page)));
        } else {
            url.set_query(None);
        }
        url.to_string()
    }

    fn parse_listing(&self, html: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let item_urls = collect_links(&document, &self.base_url, is_item_path);
        ListingPage {
            item_urls,
            last_page: detect_last_page(&document),
        }
    }

    fn extract(&self, html: &str, url: &str) -> Result<ScrapedMedicine, ExtractError> {
        let page_url = Url::parse(url).map_err(|_| ExtractError::InvalidUrl(url.to_string()))?;
        let document = Html::parse_document(html);

        let name = first_text(&document, NAME).ok_or_else(|| ExtractError::MissingField {
            field: "name",
            url: url.to_string(),
        })?;

        let mut item = ScrapedMedicine::new(url.to_string(), name);
        item.generic_name = first_text(&document, GENERIC);
        item.brand_name = first_text(&document, BRAND).or_else(|| Some(item.name.clone()));
        item.manufacturer = first_text(&document, MANUFACTURER);
        item.strength = first_text(&document, STRENGTH);
        item.dosage_form = first_text(&document, DOSAGE_FORM);
        item.pack_size = first_text(&document, PACK_SIZE);

        let price_text = first_text(&document, PRICE);
        item.price = price_text.as_deref().and_then(parse_price);
        item.currency = Some(crate::sites::DEFAULT_CURRENCY.to_string());

        item.description = first_text(&document, DESCRIPTION);
        item.indications = first_text(&document, INDICATIONS);
        item.contraindications = first_text(&document, CONTRAINDICATIONS);
        item.side_effects = first_text(&document, SIDE_EFFECTS);
        item.dosage_instructions = first_text(&document, DOSAGE);
        item.storage_conditions = first_text(&document, STORAGE);
        item.category = first_text(&document, CATEGORY);

        item.product_code = first_text(&document, PRODUCT_CODE)
            .map(|code| code.trim_start_matches("SKU:").trim().to_string())
            .filter(|code| !code.is_empty())
            .or_else(|| fallback_code(&page_url));

        item.image_url = product_image(&document, &page_url);

        item.raw_data = json!({
            "price_text": price_text,
            "page_title": extract_title(&document),
            "meta_description": meta_description(&document),
        });

        Ok(item)
    }
}

fn is_item_path(url: &Url) -> bool {
    let path = url.path();
    ["/medicine/", "/product/"].iter().any(|prefix| {
        path.find(prefix)
            .map(|idx| !path[idx + prefix.len()..].trim_matches('/').is_empty())
            .unwrap_or(false)
    })
}

/// `ME_<last path segment>`
fn fallback_code(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| format!("ME_{}", segment))
}

fn product_image(document: &Html, page_url: &Url) -> Option<String> {
    IMAGE.iter().find_map(|css| {
        let src = select_attr(document, css, "src").or_else(|| select_attr(document, css, "data-src"))?;
        let resolved = resolve_link(&src, page_url)?;
        Some(unwrap_next_image(&resolved).to_string())
    })
}

/// Next.js serves images through `/_next/image?url=<original>&w=..`
fn unwrap_next_image(url: &Url) -> Url {
    if url.path() != "/_next/image" {
        return url.clone();
    }
    url.query_pairs()
        .find(|(key, _)| key == "url")
        .and_then(|(_, original)| url.join(&original).ok())
        .unwrap_or_else(|| url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::parser::selector;

    const ITEM_URL: &str = "https://medeasy.health/medicine/napa-500mg-tablet";

    fn profile() -> MedeasyProfile {
        MedeasyProfile::new(Url::parse("https://medeasy.health").unwrap())
    }

    #[test]
    fn test_all_selectors_parse() {
        for list in [
            NAME,
            GENERIC,
            BRAND,
            MANUFACTURER,
            STRENGTH,
            DOSAGE_FORM,
            PACK_SIZE,
            PRICE,
            DESCRIPTION,
            INDICATIONS,
            CONTRAINDICATIONS,
            SIDE_EFFECTS,
            DOSAGE,
            STORAGE,
            PRODUCT_CODE,
            CATEGORY,
            IMAGE,
        ] {
            for css in list {
                assert!(selector(css).is_some(), "{}", css);
            }
        }
    }

    #[test]
    fn test_listing_urls() {
        assert_eq!(profile().listing_url(1), "https://medeasy.health/medicines");
        assert_eq!(
            profile().listing_url(3),
            "https://medeasy.health/medicines?page=3"
        );
    }

    #[test]
    fn test_parse_listing() {
        let html = r#"<html><body>
            <a href="/medicine/napa-500mg-tablet">Napa</a>
            <a href="/product/ace-plus">Ace Plus</a>
            <a href="/medicine/">Index</a>
            <a href="/medicines?page=2">Next</a>
            <ul class="pagination"><li><a href="/medicines?page=2">2</a></li><li><a href="/medicines?page=40">40</a></li></ul>
        </body></html>"#;

        let listing = profile().parse_listing(html);
        assert_eq!(
            listing.item_urls,
            vec![
                "https://medeasy.health/medicine/napa-500mg-tablet".to_string(),
                "https://medeasy.health/product/ace-plus".to_string(),
            ]
        );
        assert_eq!(listing.last_page, Some(40));
    }

    #[test]
    fn test_extract() {
        let html = r#"<html><head><title>Napa 500mg</title></head><body>
            <ol class="breadcrumb"><li>Home</li><li>Pain Relief</li></ol>
            <h1 class="product-title">Napa 500mg Tablet</h1>
            <span class="generic-name">Paracetamol</span>
            <span class="manufacturer">Beximco Pharmaceuticals Ltd.</span>
            <span class="price">৳ 12.00</span>
            <div class="description">Fever and mild pain.</div>
            <div class="product-image"><img src="/_next/image?url=%2Fimages%2Fnapa.png&amp;w=640"></div>
        </body></html>"#;

        let item = profile().extract(html, ITEM_URL).unwrap();
        assert_eq!(item.name, "Napa 500mg Tablet");
        assert_eq!(item.brand_name.as_deref(), Some("Napa 500mg Tablet"));
        assert_eq!(item.generic_name.as_deref(), Some("Paracetamol"));
        assert_eq!(
            item.manufacturer.as_deref(),
            Some("Beximco Pharmaceuticals Ltd.")
        );
        assert_eq!(item.price, Some(12.0));
        assert_eq!(item.category.as_deref(), Some("Pain Relief"));
        assert_eq!(item.product_code.as_deref(), Some("ME_napa-500mg-tablet"));
        assert_eq!(
            item.image_url.as_deref(),
            Some("https://medeasy.health/images/napa.png")
        );
        assert_eq!(item.side_effects, None);
    }

    #[test]
    fn test_explicit_product_code() {
        let html = r#"<h1>Ace</h1><span class="sku">SKU: ACE-500</span>"#;
        let item = profile().extract(html, ITEM_URL).unwrap();
        assert_eq!(item.product_code.as_deref(), Some("ACE-500"));
    }

    #[test]
    fn test_missing_name() {
        let html = r#"<html><body><span class="price">৳ 5</span></body></html>"#;
        assert!(matches!(
            profile().extract(html, ITEM_URL),
            Err(ExtractError::MissingField { field: "name", .. })
        ));
    }

    #[test]
    fn test_plain_image_url_kept() {
        let page = Url::parse(ITEM_URL).unwrap();
        let url = Url::parse("https://cdn.medeasy.health/napa.jpg").unwrap();
        assert_eq!(unwrap_next_image(&url), url);
        assert!(page.join("/_next/image").is_ok());
    }
}
