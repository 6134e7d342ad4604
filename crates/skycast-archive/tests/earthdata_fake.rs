use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use skycast_archive::{ArchiveError, DiskCache, EarthdataArchive};
use skycast_core::{
    extract_precipitation, CacheSlot, GeoPoint, GranuleQuery, Product,
};

#[derive(Default)]
struct Hits {
    search: AtomicUsize,
    axes: AtomicUsize,
    data: AtomicUsize,
}

const AXES: &str = "Dataset: 3B-DAY.MS.MRG.3IMERG.20190601-S000000-E235959.V07B.nc4\n\
time, 1559347200\n\
lat, 39.85, 39.95\n\
lon, 116.35, 116.45\n";

// time x lon x lat, as the precipitation product stores it
const DATA: &str = "Dataset: 3B-DAY.MS.MRG.3IMERG.20190601-S000000-E235959.V07B.nc4\n\
precipitation.precipitation[0][0], 0.10, 0.20\n\
precipitation.precipitation[0][1], 0.30, -9999.9\n\
precipitation.time, 1559347200\n";

async fn spawn_fake(granules: bool, fail_data: bool) -> (SocketAddr, Arc<Hits>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(Hits::default());

    let search = move |State(hits): State<Arc<Hits>>| async move {
        hits.search.fetch_add(1, Ordering::SeqCst);
        let entry = serde_json::json!({
            "title": "3B-DAY.MS.MRG.3IMERG.20190601",
            "links": [
                {"href": format!("http://{addr}/data/precip.nc4")},
                {"href": format!("http://{addr}/opendap/precip.nc4.html")}
            ]
        });
        let entries = if granules { vec![entry] } else { vec![] };
        Json(serde_json::json!({"feed": {"entry": entries}}))
    };

    let ascii = move |State(hits): State<Arc<Hits>>, RawQuery(query): RawQuery| async move {
        let query = query.unwrap_or_default();
        if query == "time,lat,lon" {
            hits.axes.fetch_add(1, Ordering::SeqCst);
            return (StatusCode::OK, AXES.to_string());
        }
        hits.data.fetch_add(1, Ordering::SeqCst);
        if fail_data {
            return (StatusCode::INTERNAL_SERVER_ERROR, "backend down".to_string());
        }
        assert_eq!(query, "precipitation[0:0][0:1][0:1]");
        (StatusCode::OK, DATA.to_string())
    };

    let router = Router::new()
        .route("/search/granules.json", get(search))
        .route("/opendap/precip.nc4.ascii", get(ascii))
        .with_state(Arc::clone(&hits));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, hits)
}

fn archive(addr: SocketAddr, dir: &std::path::Path) -> EarthdataArchive {
    EarthdataArchive::new(
        format!("http://{addr}"),
        Some("test-token".into()),
        DiskCache::new(dir.join("data"), dir.join("previous")),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn query(slot: CacheSlot) -> GranuleQuery {
    GranuleQuery::new(
        Product::Precipitation,
        NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
        GeoPoint::new(39.9, 116.4),
        slot,
    )
}

#[tokio::test]
async fn retrieves_subsets_and_caches() {
    let (addr, hits) = spawn_fake(true, false).await;
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(addr, dir.path());

    let grid = archive
        .retrieve(&query(CacheSlot::History))
        .await
        .unwrap()
        .expect("one granule");
    assert_eq!(grid.lat(), &[39.85, 39.95]);
    assert_eq!(grid.lon(), &[116.35, 116.45]);
    // lon 116.35 / lat 39.95 was stored second in the first row
    assert_eq!(grid.value("precipitation", 0, 1, 0), Some(0.20));
    assert_eq!(grid.value("precipitation", 0, 0, 1), Some(0.30));
    assert_eq!(grid.value("precipitation", 0, 1, 1), None);

    let sample = extract_precipitation(&grid, GeoPoint::new(39.86, 116.44));
    assert_eq!(sample.precip_mm_hr, Some(0.30));

    // second call reuses the cached subset, only the search is repeated
    archive.retrieve(&query(CacheSlot::History)).await.unwrap();
    assert_eq!(hits.search.load(Ordering::SeqCst), 2);
    assert_eq!(hits.axes.load(Ordering::SeqCst), 1);
    assert_eq!(hits.data.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("data").read_dir().unwrap().count() >= 2);

    // lookups use their own directory
    archive.retrieve(&query(CacheSlot::Lookup)).await.unwrap();
    assert_eq!(hits.data.load(Ordering::SeqCst), 2);
    assert!(dir.path().join("previous").exists());
}

#[tokio::test]
async fn empty_search_is_none() {
    let (addr, hits) = spawn_fake(false, false).await;
    let dir = tempfile::tempdir().unwrap();
    let result = archive(addr, dir.path())
        .retrieve(&query(CacheSlot::History))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(hits.axes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_error_is_reported_and_not_cached() {
    let (addr, _hits) = spawn_fake(true, true).await;
    let dir = tempfile::tempdir().unwrap();
    let err = archive(addr, dir.path())
        .retrieve(&query(CacheSlot::History))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Status { status: 500, .. }));

    let cached: Vec<_> = dir
        .path()
        .join("data")
        .read_dir()
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(cached, vec!["precip.nc4.axes.ascii".to_string()]);
}
