use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use skycast_core::{Archive, GranuleQuery, GriddedObservation};

use crate::cache::DiskCache;
use crate::cmr::{opendap_urls, search_url};
use crate::dap::GranuleAxes;
use crate::{ArchiveError, ArchiveResult};

/// NASA Earthdata archive: CMR search plus OPeNDAP subsetting
pub struct EarthdataArchive {
    client: Client,
    cmr_url: String,
    token: Option<String>,
    cache: DiskCache,
}

impl EarthdataArchive {
    pub fn new(
        cmr_url: String,
        token: Option<String>,
        cache: DiskCache,
        timeout: Duration,
    ) -> ArchiveResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skycast/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            cmr_url,
            token,
            cache,
        })
    }

    async fn get_text(&self, url: &str) -> ArchiveResult<String> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ArchiveError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(resp.text().await?)
    }

    /// OPeNDAP endpoints of the granules matching `query`
    pub async fn search(&self, query: &GranuleQuery) -> ArchiveResult<Vec<String>> {
        let url = search_url(&self.cmr_url, query.product, query.date, &query.bbox)?;
        let body = self.get_text(url.as_str()).await?;
        opendap_urls(&body)
    }

    async fn fetch_granule(
        &self,
        opendap: &str,
        query: &GranuleQuery,
    ) -> ArchiveResult<GriddedObservation> {
        let name = opendap.rsplit('/').next().unwrap_or(opendap);

        let axes_url = format!("{opendap}.ascii?time,lat,lon");
        let axes = self
            .cache
            .get_or_fetch(query.slot, &format!("{name}.axes.ascii"), || {
                self.get_text(&axes_url)
            })
            .await?;
        let axes = GranuleAxes::from_ascii(&axes)?;
        let subset = axes.subset(&query.bbox)?;

        let variables = query.product.variables();
        let order = query.product.dim_order();
        let data_url = format!("{opendap}.ascii?{}", subset.constraint(variables, order));
        let body = self
            .cache
            .get_or_fetch(query.slot, &format!("{name}.{}.ascii", subset.tag()), || {
                self.get_text(&data_url)
            })
            .await?;

        subset.to_grid(&axes, &body, variables, order)
    }

    /// Every granule of the day stacked along time; `None` when the search is empty
    pub async fn retrieve(
        &self,
        query: &GranuleQuery,
    ) -> ArchiveResult<Option<GriddedObservation>> {
        let urls = self.search(query).await?;
        tracing::debug!(
            product = query.product.short_name(),
            date = %query.date,
            granules = urls.len(),
            "granule search"
        );

        let mut stacked: Option<GriddedObservation> = None;
        for url in &urls {
            let grid = self.fetch_granule(url, query).await?;
            stacked = Some(match stacked {
                Some(acc) => acc.stack(grid)?,
                None => grid,
            });
        }
        Ok(stacked)
    }
}

#[async_trait::async_trait]
impl Archive for EarthdataArchive {
    async fn fetch(&self, query: &GranuleQuery) -> Result<Option<GriddedObservation>> {
        Ok(self.retrieve(query).await?)
    }
}
