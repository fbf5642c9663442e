//! Page fetching for configured vendor sites.
//!
//! This is glue around the pipeline: it turns product pages into an ordered
//! batch of [`RawListing`]s and nothing more.

use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::common::error::Result;
use crate::config::SiteConfig;
use crate::domain::{RawListing, ScrapedPrice};
use crate::metrics::FetchMetrics;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
const REQUEST_TIMEOUT_SECS: u64 = 30;

const LD_JSON_SELECTOR: &str = "script[type='application/ld+json']";

/// Product description areas tried when a site has no description selector.
const DESCRIPTION_SELECTORS: &[&str] = &["main", "article"];

/// Elements whose text never belongs to a listing.
const HIDDEN_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "title", "head", "nav", "header", "footer", "aside",
];

/// Price locations tried when a site has no price selector of its own.
const FALLBACK_PRICE_SELECTORS: &[&str] = &[
    "meta[property='og:price:amount']",
    "meta[property='product:price:amount']",
    "[itemprop='price']",
    ".price-item--regular",
    ".product-price",
    ".price",
];

/// Anything that can deliver a finished, ordered batch of listings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listings(&self) -> Result<Vec<RawListing>>;
}

pub struct HttpListingSource {
    client: reqwest::Client,
    sites: Vec<SiteConfig>,
}

impl HttpListingSource {
    pub fn new(sites: Vec<SiteConfig>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, sites })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    /// Pages are fetched concurrently but returned in configuration order.
    /// A page that fails to load is logged and left out.
    #[instrument(skip(self), fields(sites = self.sites.len()))]
    async fn fetch_listings(&self) -> Result<Vec<RawListing>> {
        let mut handles = Vec::new();
        for site in &self.sites {
            for url in &site.urls {
                let client = self.client.clone();
                let site = site.clone();
                let url = url.clone();
                handles.push(tokio::spawn(async move {
                    let result = fetch_page(&client, &url).await;
                    (site, url, result)
                }));
            }
        }

        let mut listings = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((site, url, Ok(html))) => {
                    FetchMetrics::record_page_fetched(html.len());
                    listings.push(listing_from_html(&site, &url, &html));
                }
                Ok((site, url, Err(e))) => {
                    FetchMetrics::record_fetch_error();
                    warn!(site = %site.name, url = %url, "fetch failed: {}", e);
                }
                Err(e) => {
                    FetchMetrics::record_fetch_error();
                    warn!("fetch task failed: {}", e);
                }
            }
        }

        info!("Fetched {} listings", listings.len());
        Ok(listings)
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    debug!(url, "fetching page");
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Product facts read from a schema.org `Product` in the page's JSON-LD.
#[derive(Debug, Default, Clone, PartialEq)]
struct LdProduct {
    name: Option<String>,
    description: Option<String>,
    price: Option<ScrapedPrice>,
}

/// Build a listing from a product page.
///
/// The listing text is the title followed by the product description; page
/// navigation, headers and footers are left out. Site selectors are tried
/// first, then JSON-LD, then generic markup.
pub fn listing_from_html(site: &SiteConfig, url: &str, html: &str) -> RawListing {
    let document = Html::parse_document(html);
    let product = ld_json_product(&document).unwrap_or_default();

    let title = site
        .title_selector
        .as_deref()
        .and_then(|css| select_text(&document, css))
        .or(product.name)
        .or_else(|| select_text(&document, "h1"))
        .or_else(|| select_text(&document, "title"));

    let price = site
        .price_selector
        .as_deref()
        .and_then(|css| select_text(&document, css))
        .map(ScrapedPrice::Text)
        .or(product.price)
        .or_else(|| {
            FALLBACK_PRICE_SELECTORS
                .iter()
                .find_map(|css| select_text(&document, css))
                .map(ScrapedPrice::Text)
        });

    let description = site
        .description_selector
        .as_deref()
        .and_then(|css| select_region_text(&document, css))
        .or(product.description)
        .or_else(|| {
            DESCRIPTION_SELECTORS
                .iter()
                .find_map(|css| select_region_text(&document, css))
        })
        .unwrap_or_else(|| visible_text(document.root_element()));

    let scraped_weight = site
        .weight_selector
        .as_deref()
        .and_then(|css| select_all_text(&document, css));

    let text = match &title {
        Some(title) if !description.is_empty() => format!("{} {}", title, description),
        Some(title) => title.clone(),
        None => description,
    };

    RawListing {
        text,
        title,
        source_url: url.to_string(),
        scraped_price: price,
        scraped_at: Utc::now(),
        vendor: Some(site.name.clone()),
        scraped_weight,
    }
}

/// First schema.org `Product` found in the page's JSON-LD blocks, looking
/// through top-level arrays and `@graph`. Unparseable blocks are skipped.
fn ld_json_product(document: &Html) -> Option<LdProduct> {
    let selector = Selector::parse(LD_JSON_SELECTOR).ok()?;
    document.select(&selector).find_map(|script| {
        let raw: String = script.text().collect();
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!("skipping unparseable JSON-LD block: {}", e);
                return None;
            }
        };
        let product = find_product(&value)?;
        Some(LdProduct {
            name: json_text(product.get("name")),
            description: json_text(product.get("description")),
            price: product.get("offers").and_then(offer_price),
        })
    })
}

fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(kind)) => kind == "Product",
                Some(Value::Array(kinds)) => kinds.iter().any(|k| k.as_str() == Some("Product")),
                _ => false,
            };
            if is_product {
                Some(value)
            } else {
                map.get("@graph").and_then(find_product)
            }
        }
        _ => None,
    }
}

/// `offers` may be one offer, a list of offers or an `AggregateOffer`.
fn offer_price(offers: &Value) -> Option<ScrapedPrice> {
    match offers {
        Value::Array(items) => items.iter().find_map(offer_price),
        Value::Object(map) => ["price", "lowPrice"]
            .iter()
            .find_map(|key| match map.get(*key)? {
                Value::Number(n) => n.as_f64().map(ScrapedPrice::Amount),
                Value::String(s) => {
                    let text = collapse(s);
                    (!text.is_empty()).then_some(ScrapedPrice::Text(text))
                }
                _ => None,
            }),
        _ => None,
    }
}

fn json_text(value: Option<&Value>) -> Option<String> {
    let text = collapse(value?.as_str()?);
    (!text.is_empty()).then_some(text)
}

/// Text of the first element matching `css`, or its `content` attribute for
/// `<meta>` tags. Blank results count as no match.
fn select_text(document: &Html, css: &str) -> Option<String> {
    let selector = parse_selector(css)?;
    let element = document.select(&selector).next()?;
    let text = match element.value().attr("content") {
        Some(content) => content.to_string(),
        None => element_text(element),
    };
    let text = collapse(&text);
    (!text.is_empty()).then_some(text)
}

/// Visible text of the first element matching `css`.
fn select_region_text(document: &Html, css: &str) -> Option<String> {
    let selector = parse_selector(css)?;
    let text = visible_text(document.select(&selector).next()?);
    (!text.is_empty()).then_some(text)
}

/// Visible text of every element matching `css`, joined.
fn select_all_text(document: &Html, css: &str) -> Option<String> {
    let selector = parse_selector(css)?;
    let parts: Vec<String> = document
        .select(&selector)
        .map(visible_text)
        .filter(|text| !text.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = css, "invalid CSS selector: {:?}", e);
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Text under `root`, leaving out scripts, page chrome and navigation found
/// below it.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != root.id())
            .filter_map(|ancestor| ancestor.value().as_element().map(|e| e.name()))
            .any(|name| HIDDEN_ELEMENTS.contains(&name));
        if !hidden {
            parts.push(text.to_string());
        }
    }
    collapse(&parts.join(" "))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::domain::BucketName;
    use crate::pipeline::validate::RejectionReason;
    use crate::pipeline::Pipeline;

    fn site(price_selector: Option<&str>) -> SiteConfig {
        SiteConfig {
            name: "Example Caviar".to_string(),
            urls: vec![],
            title_selector: None,
            price_selector: price_selector.map(str::to_string),
            description_selector: None,
            weight_selector: None,
        }
    }

    fn default_pipeline() -> Pipeline {
        Pipeline::new(&PipelineConfig::default()).unwrap()
    }

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Shop | Example</title>
            <meta property="og:price:amount" content="250.00">
            <script>var related = "Beluga 500g";</script>
          </head>
          <body>
            <h1>Osetra Caviar Tin 100g</h1>
            <span class="sale">$199.00</span>
            <p>Classic grade, shipped overnight.</p>
          </body>
        </html>"#;

    #[test]
    fn test_title_comes_first_and_scripts_are_dropped() {
        let listing = listing_from_html(&site(None), "https://example.com/p/osetra", PAGE);
        assert!(listing.text.starts_with("Osetra Caviar Tin 100g"));
        assert!(listing.text.contains("Classic grade"));
        assert!(!listing.text.contains("Beluga"));
        assert_eq!(listing.source_url, "https://example.com/p/osetra");
        assert_eq!(listing.vendor.as_deref(), Some("Example Caviar"));
    }

    #[test]
    fn test_meta_price_fallback() {
        let listing = listing_from_html(&site(None), "u", PAGE);
        assert_eq!(
            listing.scraped_price,
            Some(ScrapedPrice::Text("250.00".to_string()))
        );
    }

    #[test]
    fn test_site_price_selector_wins() {
        let listing = listing_from_html(&site(Some(".sale")), "u", PAGE);
        assert_eq!(
            listing.scraped_price,
            Some(ScrapedPrice::Text("$199.00".to_string()))
        );
    }

    #[test]
    fn test_invalid_selector_is_ignored() {
        let listing = listing_from_html(&site(Some("[[[")), "u", PAGE);
        assert_eq!(
            listing.scraped_price,
            Some(ScrapedPrice::Text("250.00".to_string()))
        );
    }

    const SHOP_PAGE: &str = r#"
        <html>
          <head><title>Osetra | Example Caviar</title></head>
          <body>
            <header>Free shipping on gift sets over $200</header>
            <nav>
              <a href="/caviar">Caviar</a>
              <a href="/accessories">Accessories</a>
              <a href="/gifts">Gift Sets</a>
            </nav>
            <h1>Osetra Caviar 50g</h1>
            <span class="price">$120.00</span>
            <p>Classic grade, firm golden pearls.</p>
            <aside>Pair it with a mother of pearl spoon</aside>
            <footer>Spoons, servers and openers</footer>
          </body>
        </html>"#;

    #[test]
    fn test_navigation_and_footer_are_not_listing_text() {
        let listing = listing_from_html(&site(None), "https://example.com/p/osetra", SHOP_PAGE);
        assert_eq!(listing.title.as_deref(), Some("Osetra Caviar 50g"));
        assert!(listing.text.contains("Classic grade"));
        assert!(!listing.text.contains("Accessories"));
        assert!(!listing.text.contains("Gift Sets"));
        assert!(!listing.text.contains("spoon"));

        let record = default_pipeline().process_listing(&listing).unwrap();
        assert_eq!(record.price_usd(), 120.0);
        assert_eq!(record.size_grams(), 50.0);
    }

    #[test]
    fn test_main_element_is_the_description() {
        let page = r#"
            <html><body>
              <div class="menu">Spoons and gift sets</div>
              <main>
                <h1>Kaluga Reserve 100g</h1>
                <p>$180.00</p>
              </main>
              <div class="related">Beluga 30g $300</div>
            </body></html>"#;
        let listing = listing_from_html(&site(None), "u", page);
        assert_eq!(listing.text, "Kaluga Reserve 100g Kaluga Reserve 100g $180.00");
    }

    #[test]
    fn test_description_selector() {
        let mut site = site(None);
        site.description_selector = Some(".product-description".to_string());
        let page = r#"
            <html><body>
              <h1>Siberian Caviar</h1>
              <div class="product-description">Select grade, 1 oz tin, $60</div>
              <main>Gift box with spoon</main>
            </body></html>"#;
        let listing = listing_from_html(&site, "u", page);
        assert_eq!(listing.text, "Siberian Caviar Select grade, 1 oz tin, $60");
        let record = default_pipeline().process_listing(&listing).unwrap();
        assert_eq!(record.price_usd(), 60.0);
    }

    #[test]
    fn test_accessory_page_still_rejected() {
        let page = r#"
            <html><body>
              <nav>Caviar</nav>
              <h1>Mother of Pearl Caviar Spoon</h1>
              <p>Pairs with our Osetra 30g. $25</p>
            </body></html>"#;
        let listing = listing_from_html(&site(None), "u", page);
        assert_eq!(
            default_pipeline().process_listing(&listing),
            Err(RejectionReason::IsAccessory)
        );
    }

    const LD_PAGE: &str = r#"
        <html>
          <head>
            <script type="application/ld+json">{ not json</script>
            <script type="application/ld+json">
              {
                "@context": "https://schema.org",
                "@graph": [
                  {"@type": "Organization", "name": "Example Caviar"},
                  {
                    "@type": "Product",
                    "name": "Kaluga Hybrid Caviar 125g",
                    "description": "Buttery Kaluga,  Royal grade.",
                    "offers": [{"@type": "Offer", "price": "310.00", "priceCurrency": "USD"}]
                  }
                ]
              }
            </script>
            <meta property="og:price:amount" content="999.00">
          </head>
          <body>
            <nav>Accessories</nav>
            <h1>Kaluga</h1>
          </body>
        </html>"#;

    #[test]
    fn test_ld_json_product_name_description_and_price() {
        let listing = listing_from_html(&site(None), "u", LD_PAGE);
        assert_eq!(listing.title.as_deref(), Some("Kaluga Hybrid Caviar 125g"));
        assert_eq!(
            listing.text,
            "Kaluga Hybrid Caviar 125g Buttery Kaluga, Royal grade."
        );
        assert_eq!(
            listing.scraped_price,
            Some(ScrapedPrice::Text("310.00".to_string()))
        );

        let record = default_pipeline().process_listing(&listing).unwrap();
        assert_eq!(record.price_usd(), 310.0);
        assert_eq!(record.size_grams(), 125.0);
    }

    #[test]
    fn test_ld_json_numeric_and_aggregate_offers() {
        let page = r#"
            <script type="application/ld+json">
              [{"@type": ["Product"], "name": "Beluga 30g",
                "offers": {"@type": "AggregateOffer", "lowPrice": 295}}]
            </script>"#;
        let listing = listing_from_html(&site(None), "u", page);
        assert_eq!(listing.title.as_deref(), Some("Beluga 30g"));
        assert_eq!(listing.scraped_price, Some(ScrapedPrice::Amount(295.0)));
    }

    #[test]
    fn test_site_selectors_win_over_ld_json() {
        let mut site = site(Some("h1"));
        site.title_selector = Some("h1".to_string());
        let listing = listing_from_html(&site, "u", LD_PAGE);
        assert_eq!(listing.title.as_deref(), Some("Kaluga"));
        assert_eq!(
            listing.scraped_price,
            Some(ScrapedPrice::Text("Kaluga".to_string()))
        );
    }

    #[test]
    fn test_weight_selector() {
        let mut site = site(None);
        site.weight_selector = Some(".variant-size".to_string());
        let page = r#"
            <html><body>
              <h1>Osetra Caviar</h1>
              <p>Also sold in 30g tins. $420</p>
              <span class="variant-size">Size:</span>
              <span class="variant-size">250 g</span>
            </body></html>"#;
        let listing = listing_from_html(&site, "u", page);
        assert_eq!(listing.scraped_weight.as_deref(), Some("Size: 250 g"));

        let record = default_pipeline().process_listing(&listing).unwrap();
        assert_eq!(record.size_grams(), 250.0);

        let report = default_pipeline().run(&[listing]);
        assert_eq!(
            report.selections[&BucketName::Specials].title.as_deref(),
            Some("Osetra Caviar")
        );
    }

    #[test]
    fn test_missing_weight_selector_match_falls_back_to_text() {
        let mut site = site(None);
        site.weight_selector = Some(".variant-size".to_string());
        let listing = listing_from_html(&site, "u", SHOP_PAGE);
        assert!(listing.scraped_weight.is_none());
        let record = default_pipeline().process_listing(&listing).unwrap();
        assert_eq!(record.size_grams(), 50.0);
    }
}
