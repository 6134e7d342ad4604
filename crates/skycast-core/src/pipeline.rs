use anyhow::Result;
use chrono::NaiveDate;

use crate::grid::GriddedObservation;
use crate::types::{BoundingBox, GeoPoint, Product};

/// Where a retrieval is cached on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    /// Trailing-window retrievals
    History,
    /// Single-date lookups for past targets
    Lookup,
}

/// One product for one day over a search box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GranuleQuery {
    pub product: Product,
    pub date: NaiveDate,
    pub point: GeoPoint,
    pub bbox: BoundingBox,
    pub slot: CacheSlot,
}

/// Half-width in degrees of the search box around the query point
pub const SEARCH_HALF_WIDTH_DEG: f64 = 5.0;

impl GranuleQuery {
    pub fn new(product: Product, date: NaiveDate, point: GeoPoint, slot: CacheSlot) -> Self {
        Self {
            product,
            date,
            point,
            bbox: point.bounding_box(SEARCH_HALF_WIDTH_DEG),
            slot,
        }
    }
}

/// Search-and-download service for gridded satellite products
#[async_trait::async_trait]
pub trait Archive: Send + Sync {
    /// `Ok(None)` when no granule covers the query
    async fn fetch(&self, query: &GranuleQuery) -> Result<Option<GriddedObservation>>;
}

/// Language model producing advice from a prompt
#[async_trait::async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, prompt: &str) -> Result<String>;
}
