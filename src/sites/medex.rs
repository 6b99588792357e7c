//! MedEx (medex.com.bd) profile
//!
//! Brand pages live at `/brands/<id>/<slug>`. The heading carries the brand
//! name with the dosage form in a `small.h1-subtitle`; monograph sections are
//! accordion headers identified by id, each followed by an `.ac-body`.

use crate::sites::parser::{
    clean_text, collect_links, detect_last_page, element_text, extract_title, meta_description,
    resolve_link, select_attr, select_text, selector,
};
use crate::sites::{ExtractError, ListingPage, ScrapedMedicine, SiteKind, SiteProfile};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use url::Url;

/// Monograph sections: element id and the label kept in `raw_data`
const SECTIONS: &[(&str, &str)] = &[
    ("indications", "Indications"),
    ("composition", "Composition"),
    ("mode_of_action", "Pharmacology"),
    ("dosage", "Dosage & Administration"),
    ("interaction", "Interaction"),
    ("contraindications", "Contraindications"),
    ("side_effects", "Side Effects"),
    ("pregnancy_cat", "Pregnancy & Lactation"),
    ("precautions", "Precautions & Warnings"),
    ("pediatric_uses", "Use in Special Populations"),
    ("overdose_effects", "Overdose Effects"),
    ("drug_classes", "Therapeutic Class"),
    ("storage_conditions", "Storage Conditions"),
];

/// Footer the site appends to every section
const DISCLAIMER: &str = "* রেজিস্টার্ড চিকিৎসকের পরামর্শ মোতাবেক ঔষধ সেবন করুন";

const PACKAGING_PATH: &str = "storage/images/packaging";

fn brand_path_regex() -> &'static Regex {
    static BRAND: OnceLock<Regex> = OnceLock::new();
    BRAND.get_or_init(|| Regex::new(r"^/brands/(\d+)/[^/]+/?$").expect("valid brand regex"))
}

fn taka_regex() -> &'static Regex {
    static TAKA: OnceLock<Regex> = OnceLock::new();
    TAKA.get_or_init(|| Regex::new(r"৳\s*([\d,]+\.?\d*)").expect("valid taka regex"))
}

pub struct MedexProfile {
    base_url: Url,
}

impl MedexProfile {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

impl SiteProfile for MedexProfile {
    fn kind(&self) -> SiteKind {
        SiteKind::Medex
    }

    fn listing_url(&self, page: u32) -> String {
        let mut url = self.base_url.clone();
        url.set_path("/brands");
        if page > 1 {
            url.set_query(Some(&format!("page={}", page)));
        } else {
            url.set_query(None);
        }
        url.to_string()
    }

    fn parse_listing(&self, html: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let item_urls = collect_links(&document, &self.base_url, |url| {
            brand_path_regex().is_match(url.path())
        });
        ListingPage {
            item_urls,
            last_page: detect_last_page(&document),
        }
    }

    fn extract(&self, html: &str, url: &str) -> Result<ScrapedMedicine, ExtractError> {
        let page_url = Url::parse(url).map_err(|_| ExtractError::InvalidUrl(url.to_string()))?;
        let document = Html::parse_document(html);

        let (name, dosage_form) = brand_heading(&document);
        let name = name.ok_or_else(|| ExtractError::MissingField {
            field: "name",
            url: url.to_string(),
        })?;

        let mut item = ScrapedMedicine::new(url.to_string(), name);
        item.brand_name = Some(item.name.clone());
        item.dosage_form = dosage_form;
        item.product_code = product_code(&page_url);
        item.currency = Some(crate::sites::DEFAULT_CURRENCY.to_string());

        item.generic_name = select_text(&document, r#"div[title="Generic Name"] a"#)
            .or_else(|| select_text(&document, r#"div[title="Generic Name"]"#));
        item.strength = select_text(&document, r#"div[title="Strength"]"#);
        item.manufacturer = select_text(&document, r#"div[title="Manufactured by"] a"#)
            .or_else(|| select_text(&document, r#"div[title="Manufactured by"]"#));
        item.pack_size = select_text(&document, ".pack-size-info");

        let prices = package_prices(&document);
        item.price = prices.unit.or(prices.strip);

        let mut sections = Map::new();
        let mut description = Vec::new();
        for (id, label) in SECTIONS {
            let Some(content) = section_content(&document, id) else {
                continue;
            };
            match *id {
                "indications" => item.indications = Some(content.clone()),
                "contraindications" => item.contraindications = Some(content.clone()),
                "side_effects" => item.side_effects = Some(content.clone()),
                "dosage" => item.dosage_instructions = Some(content.clone()),
                "storage_conditions" => item.storage_conditions = Some(content.clone()),
                _ => {}
            }
            description.push(format!("{}: {}", label, content));
            sections.insert(id.to_string(), Value::String(content));
        }
        if !description.is_empty() {
            item.description = Some(description.join(" | "));
        }

        item.image_url = pack_image(&document, &page_url);

        item.raw_data = json!({
            "unit_price": prices.unit,
            "strip_price": prices.strip,
            "sections": sections,
            "common_questions": common_questions(&document),
            "page_title": extract_title(&document),
            "meta_description": meta_description(&document),
        });

        Ok(item)
    }
}

/// Brand name and dosage form from the page heading
fn brand_heading(document: &Html) -> (Option<String>, Option<String>) {
    let heading = ["h1.page-heading-1-l.brand", "h1.brand"]
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| document.select(&sel).next());
    let Some(heading) = heading else {
        return (None, None);
    };

    let full = element_text(heading);
    let subtitle = selector("small.h1-subtitle")
        .and_then(|sel| heading.select(&sel).next())
        .map(element_text)
        .filter(|s| !s.is_empty());

    let name = match &subtitle {
        Some(sub) => clean_text(&full.replacen(sub.as_str(), "", 1)),
        None => full,
    };

    ((!name.is_empty()).then_some(name), subtitle)
}

/// `MX_<id>` from `/brands/<id>/<slug>`
fn product_code(url: &Url) -> Option<String> {
    brand_path_regex()
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|id| format!("MX_{}", id.as_str()))
}

#[derive(Debug, Default, PartialEq)]
struct PackagePrices {
    unit: Option<f64>,
    strip: Option<f64>,
}

/// Reads the `Unit Price:` / `Strip Price:` label pairs
fn package_prices(document: &Html) -> PackagePrices {
    let mut prices = PackagePrices::default();
    let Some(sel) = selector(".package-container span") else {
        return prices;
    };

    let spans: Vec<ElementRef<'_>> = document.select(&sel).collect();
    for (idx, span) in spans.iter().enumerate() {
        let label = element_text(*span);
        let slot = match label.as_str() {
            "Unit Price:" => &mut prices.unit,
            "Strip Price:" => &mut prices.strip,
            _ => continue,
        };
        if slot.is_some() {
            continue;
        }
        *slot = spans
            .get(idx + 1)
            .map(|next| element_text(*next))
            .and_then(|text| taka_amount(&text));
    }

    if prices.unit.is_none() && prices.strip.is_none() {
        prices.unit = select_text(document, ".package-container").and_then(|t| taka_amount(&t));
    }
    prices
}

fn taka_amount(text: &str) -> Option<f64> {
    taka_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// The `.ac-body` that belongs to the section header with this id
fn section_body<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    let header = selector(&format!("#{}", id)).and_then(|sel| document.select(&sel).next())?;

    if let Some(body) = selector(".ac-body").and_then(|sel| header.select(&sel).next()) {
        return Some(body);
    }

    header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .filter(|el| el.value().classes().any(|c| c == "ac-body"))
}

fn section_content(document: &Html, id: &str) -> Option<String> {
    let body = section_body(document, id)?;
    let text = clean_text(&element_text(body).replace(DISCLAIMER, ""));
    (text.chars().count() > 5).then_some(text)
}

fn common_questions(document: &Html) -> Vec<Value> {
    let (Some(body), Some(item_sel), Some(q_sel), Some(a_sel)) = (
        section_body(document, "commonly_asked_questions"),
        selector(".caq"),
        selector(".caq-q"),
        selector(".caq-a"),
    ) else {
        return Vec::new();
    };

    body.select(&item_sel)
        .filter_map(|entry| {
            let question = entry.select(&q_sel).next().map(element_text)?;
            let answer = entry.select(&a_sel).next().map(element_text)?;
            (!question.is_empty() && !answer.is_empty())
                .then(|| json!({"question": question, "answer": answer}))
        })
        .collect()
}

/// Pack photo URL, if the page shows one
fn pack_image(document: &Html, page_url: &Url) -> Option<String> {
    let candidates = [
        select_attr(document, "a.innovator-brand-badge[data-mp-objects]", "href"),
        select_attr(document, &format!(r#"a[href*="{}"]"#, PACKAGING_PATH), "href"),
        select_attr(document, &format!(r#"img[src*="{}"]"#, PACKAGING_PATH), "src"),
        select_attr(
            document,
            &format!(r#"img[data-src*="{}"]"#, PACKAGING_PATH),
            "data-src",
        ),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter(|href| href.contains(PACKAGING_PATH))
        .find_map(|href| resolve_link(&href, page_url))
        .map(|url| url.to_string())
}
