//! Shared fixtures: configuration, storage and mock catalog pages

use rx_harvest::config::{parse_config, Config};
use rx_harvest::storage::{open_shared_storage, SharedStorage};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

pub const CONFIG_HASH: &str = "integration-test";

/// Creates a test configuration with one MedEx-style site at `base_url`
///
/// Pacing delays and retry backoff are zero so the tests run quickly.
pub fn create_test_config(base_url: &str, dir: &Path, max_pages: u32) -> Config {
    let toml = format!(
        r#"
[scraper]
max-pages = {max_pages}
min-delay-ms = 0
max-delay-ms = 0
request-timeout-secs = 5

[retry]
max-attempts = 2
base-delay-ms = 0
jitter-ms = 0

[user-agent]
agents = ["rx-harvest-test/1.0"]

[output]
database-path = '{db}'
html-dir = '{html}'
image-dir = '{images}'

[api]
listen-addr = "127.0.0.1:0"

[[site]]
name = "medex"
kind = "medex"
base-url = "{base_url}"
"#,
        db = dir.join("rx-harvest.db").display(),
        html = dir.join("html").display(),
        images = dir.join("images").display(),
    );
    parse_config(&toml).expect("test config is valid")
}

pub fn create_storage(config: &Config) -> SharedStorage {
    open_shared_storage(Path::new(&config.output.database_path)).expect("open test database")
}

pub fn shared_config(config: Config) -> Arc<Config> {
    Arc::new(config)
}

/// A listing page linking `/brands/<id>/brand-<id>` for every id
///
/// With `last_page`, a pagination widget advertising that page is included.
pub fn listing_page(ids: &[u32], last_page: Option<u32>) -> String {
    let links: String = ids
        .iter()
        .map(|id| format!(r#"<div class="data-row"><a href="/brands/{id}/brand-{id}">Brand {id}</a></div>"#))
        .collect();
    let pagination = last_page
        .map(|n| format!(r#"<ul class="pagination"><li><a href="/brands?page={n}">{n}</a></li></ul>"#))
        .unwrap_or_default();
    format!("<html><head><title>Brands | MedEx</title></head><body>{links}{pagination}</body></html>")
}

/// A MedEx brand page; `heading` is the inner HTML of `h1.brand`
pub fn brand_page(heading: &str, price: &str, with_indications: bool) -> String {
    let indications = if with_indications {
        r#"<div id="indications" class="ac-header">Indications</div>
           <div class="ac-body">Vitamin B deficiency and peripheral neuritis.</div>"#
    } else {
        ""
    };
    format!(
        r#"<html><head><title>Brand | MedEx</title></head><body>
        <h1 class="page-heading-1-l brand">{heading}</h1>
        <div title="Generic Name"><a href="/generics/1/vitamin-b">Vitamin B1, B6 &amp; B12</a></div>
        <div title="Manufactured by"><a href="/companies/1/jayson">Jayson Pharmaceuticals Ltd.</a></div>
        <div class="package-container"><span>Unit Price:</span><span>৳ {price}</span></div>
        {indications}
        </body></html>"#
    )
}

/// A brand page without the heading that carries the name
pub fn nameless_page() -> String {
    r#"<html><head><title>Brand | MedEx</title></head><body>
        <div title="Generic Name">Paracetamol</div>
    </body></html>"#
        .to_string()
}

/// Mounts listing page `page` (1 is the bare `/brands` URL)
///
/// Page 2 and beyond must be mounted before page 1, whose mock matches any query.
pub async fn mount_listing(server: &MockServer, page: u32, body: String) {
    let mock = Mock::given(method("GET")).and(path("/brands"));
    let mock = if page > 1 {
        mock.and(query_param("page", page.to_string()))
    } else {
        mock
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_item(server: &MockServer, id: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/brands/{id}/brand-{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub fn item_url(server: &MockServer, id: u32) -> String {
    format!("{}/brands/{id}/brand-{id}", server.uri())
}

/// Responds normally and runs a side effect when the request arrives
pub struct OnRequest<F: Fn() + Send + Sync + 'static> {
    pub body: String,
    pub effect: F,
}

impl<F: Fn() + Send + Sync + 'static> Respond for OnRequest<F> {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        (self.effect)();
        ResponseTemplate::new(200).set_body_string(self.body.clone())
    }
}
