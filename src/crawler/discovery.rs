//! Route discovery on region landing pages

use crate::config::RegionEntry;
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::parser::resolve_link;
use std::collections::HashSet;
use url::Url;

/// A configured source region with a parsed entry URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub entry_url: Url,
}

impl TryFrom<&RegionEntry> for Region {
    type Error = url::ParseError;

    fn try_from(entry: &RegionEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            name: entry.name.clone(),
            entry_url: Url::parse(&entry.entry_url)?,
        })
    }
}

/// A route advertised on a region's landing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub link: Url,
    pub region: String,
}

/// Extracts the routes advertised on the page currently loaded in `fetcher`
///
/// The region's entry page must already be loaded. Links resolve against the
/// URL the page was served from, which differs from the entry URL when the
/// entry redirects. Routes come back in page
/// order; a link seen earlier on the page wins over later duplicates, and
/// elements without a usable link are skipped. A page without route
/// elements yields an empty list.
pub async fn discover_routes(
    fetcher: &mut dyn PageFetcher,
    region: &Region,
    route_selector: &str,
) -> Result<Vec<Route>, FetchError> {
    let elements = fetcher.query_all(route_selector).await?;
    let base = fetcher
        .current_url()
        .unwrap_or_else(|| region.entry_url.clone());

    let mut seen = HashSet::new();
    let mut routes = Vec::with_capacity(elements.len());

    for element in elements {
        let Some(href) = element.attribute("href") else {
            tracing::debug!(region = %region.name, "Route element without href");
            continue;
        };

        let Some(link) = resolve_link(href, &base) else {
            tracing::debug!(region = %region.name, href, "Skipping unusable route link");
            continue;
        };

        if !seen.insert(link.as_str().to_string()) {
            continue;
        }

        routes.push(Route {
            name: element.text().trim().to_string(),
            link,
            region: region.name.clone(),
        });
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::ScriptedFetcher;

    fn goa() -> Region {
        Region {
            name: "Goa".to_string(),
            entry_url: Url::parse("https://example.com/online-booking/ktcl/").unwrap(),
        }
    }

    async fn discover(html: &str) -> Vec<Route> {
        let region = goa();
        let mut fetcher = ScriptedFetcher::new().page(region.entry_url.as_str(), html);
        fetcher.load(&region.entry_url).await.unwrap();
        discover_routes(&mut fetcher, &region, ".route").await.unwrap()
    }

    #[tokio::test]
    async fn test_routes_in_page_order() {
        let routes = discover(
            r#"
            <a class="route" href="/bus/panaji-margao">Panaji to Margao</a>
            <a class="route" href="https://example.com/bus/mapusa-panaji">Mapusa to Panaji</a>
            "#,
        )
        .await;

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name, "Panaji to Margao");
        assert_eq!(routes[0].link.as_str(), "https://example.com/bus/panaji-margao");
        assert_eq!(routes[0].region, "Goa");
        assert_eq!(routes[1].name, "Mapusa to Panaji");
    }

    #[tokio::test]
    async fn test_links_resolve_against_redirected_page() {
        let region = Region {
            name: "Jammu and Kashmir".to_string(),
            entry_url: Url::parse("https://example.com/online-booking/jksrtc").unwrap(),
        };
        let mut fetcher = ScriptedFetcher::new()
            .redirect(
                "https://example.com/online-booking/jksrtc",
                "https://example.com/online-booking/jksrtc/",
            )
            .page(
                "https://example.com/online-booking/jksrtc/",
                r#"<a class="route" href="jammu-to-srinagar">Jammu to Srinagar</a>"#,
            );
        fetcher.load(&region.entry_url).await.unwrap();

        let routes = discover_routes(&mut fetcher, &region, ".route")
            .await
            .unwrap();

        assert_eq!(routes.len(), 1);
        assert_eq!(
            routes[0].link.as_str(),
            "https://example.com/online-booking/jksrtc/jammu-to-srinagar"
        );
    }

    #[tokio::test]
    async fn test_duplicate_links_keep_first() {
        let routes = discover(
            r#"
            <a class="route" href="/bus/panaji-margao">Panaji to Margao</a>
            <a class="route" href="/bus/mapusa-panaji">Mapusa to Panaji</a>
            <a class="route" href="/bus/panaji-margao#top">Panaji - Margao</a>
            "#,
        )
        .await;

        let names: Vec<_> = routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Panaji to Margao", "Mapusa to Panaji"]);
    }

    #[tokio::test]
    async fn test_elements_without_usable_link_skipped() {
        let routes = discover(
            r#"
            <a class="route">No link</a>
            <a class="route" href="javascript:void(0)">Script</a>
            <a class="route" href="/bus/vasco-margao">Vasco to Margao</a>
            "#,
        )
        .await;

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "Vasco to Margao");
    }

    #[tokio::test]
    async fn test_empty_page_yields_no_routes() {
        let routes = discover("<html><body><p>No routes today</p></body></html>").await;
        assert!(routes.is_empty());
    }

    #[test]
    fn test_region_from_entry() {
        let entry = RegionEntry {
            name: "Goa".to_string(),
            entry_url: "https://example.com/online-booking/ktcl/".to_string(),
        };
        let region = Region::try_from(&entry).unwrap();
        assert_eq!(region.entry_url.host_str(), Some("example.com"));

        let bad = RegionEntry {
            name: "Nowhere".to_string(),
            entry_url: "not a url".to_string(),
        };
        assert!(Region::try_from(&bad).is_err());
    }
}
