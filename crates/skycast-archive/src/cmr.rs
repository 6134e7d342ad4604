//! CMR granule search

use chrono::NaiveDate;
use serde::Deserialize;
use skycast_core::{BoundingBox, Product};
use url::Url;

use crate::ArchiveResult;

pub const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub feed: Feed,
}

#[derive(Debug, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub entry: Vec<GranuleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GranuleEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
}

impl GranuleEntry {
    /// OPeNDAP data URL without any `.html` form suffix
    pub fn opendap_url(&self) -> Option<String> {
        self.links
            .iter()
            .map(|l| l.href.as_str())
            .find(|href| href.contains("opendap"))
            .map(|href| href.trim_end_matches(".html").to_string())
    }
}

/// Granule search URL for one product, day and box
pub fn search_url(
    cmr_url: &str,
    product: Product,
    date: NaiveDate,
    bbox: &BoundingBox,
) -> ArchiveResult<Url> {
    let base = format!("{}/", cmr_url.trim_end_matches('/'));
    let mut url = Url::parse(&base)?.join("search/granules.json")?;
    let day = date.format("%Y-%m-%d");
    url.query_pairs_mut()
        .append_pair("short_name", product.short_name())
        .append_pair("version", product.version())
        .append_pair("temporal", &format!("{day}T00:00:00Z,{day}T23:59:59Z"))
        .append_pair("bounding_box", &bbox.to_query_param())
        .append_pair("page_size", &PAGE_SIZE.to_string());
    Ok(url)
}

/// OPeNDAP endpoints in the order the search listed them
pub fn opendap_urls(body: &str) -> ArchiveResult<Vec<String>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let urls = response
        .feed
        .entry
        .iter()
        .filter_map(|entry| {
            let url = entry.opendap_url();
            if url.is_none() {
                tracing::debug!(title = ?entry.title, "granule has no OPeNDAP link");
            }
            url
        })
        .collect();
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::GeoPoint;

    #[test]
    fn test_search_url() {
        let bbox = GeoPoint::new(39.9, 116.4).bounding_box(5.0);
        let date = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let url = search_url("https://cmr.example.test/", Product::Precipitation, date, &bbox)
            .unwrap();

        assert_eq!(url.path(), "/search/granules.json");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("short_name".into(), "GPM_3IMERGDL".into())));
        assert!(pairs.contains(&("version".into(), "07".into())));
        assert!(pairs.contains(&(
            "temporal".into(),
            "2019-06-01T00:00:00Z,2019-06-01T23:59:59Z".into()
        )));
        assert!(pairs.contains(&("page_size".into(), "50".into())));
    }

    #[test]
    fn test_opendap_links_are_picked() {
        let body = r#"{"feed": {"entry": [
            {"title": "a", "links": [
                {"href": "https://data.example.test/a.nc4"},
                {"href": "https://opendap.example.test/a.nc4.html"}
            ]},
            {"title": "b", "links": [{"href": "https://data.example.test/b.nc4"}]},
            {"title": "c", "links": [{"href": "https://opendap.example.test/c.nc4"}]}
        ]}}"#;
        assert_eq!(
            opendap_urls(body).unwrap(),
            vec![
                "https://opendap.example.test/a.nc4".to_string(),
                "https://opendap.example.test/c.nc4".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_feed() {
        assert!(opendap_urls(r#"{"feed": {}}"#).unwrap().is_empty());
        assert!(opendap_urls("not json").is_err());
    }
}
