use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;
use vitibrasil_api::app::ports::{FetchedPayload, RemoteFetcher};
use vitibrasil_api::pipeline::{Pipeline, SourceLoader};
use vitibrasil_api::server::{cache::DatasetCache, create_router, AppState};

/// Serves the production feed and counts calls; every other file is missing.
struct CountingFetcher {
    producao: String,
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPayload, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.ends_with("/Producao.csv") {
            Ok(FetchedPayload {
                status: 200,
                bytes: self.producao.as_bytes().to_vec(),
                content_type: "text/csv".to_string(),
            })
        } else {
            Ok(FetchedPayload {
                status: 404,
                bytes: Vec::new(),
                content_type: "text/html".to_string(),
            })
        }
    }
}

/// Five products over five years: 25 records.
fn producao_csv() -> String {
    let mut body = String::from("id;produto;control;2016;2017;2018;2019;2020\n");
    for id in 1..=5 {
        body.push_str(&format!("{id};vinho {id};vm_vinho{id};1;2;3;4;5\n"));
    }
    body
}

struct TestApp {
    router: Router,
    fetcher: Arc<CountingFetcher>,
    _data_root: TempDir,
}

fn app_with_ttl(ttl: Duration) -> Result<TestApp> {
    let dir = tempdir()?;
    let fetcher = Arc::new(CountingFetcher {
        producao: producao_csv(),
        calls: AtomicUsize::new(0),
    });
    let loader = SourceLoader::new(fetcher.clone(), "http://remote.test/download", dir.path());
    let state = AppState::new(Pipeline::new(loader), DatasetCache::new(ttl));
    Ok(TestApp {
        router: create_router(state),
        fetcher,
        _data_root: dir,
    })
}

fn app() -> Result<TestApp> {
    app_with_ttl(Duration::from_secs(3600))
}

async fn get(router: &Router, uri: &str) -> Result<(StatusCode, axum::http::HeaderMap, Vec<u8>)> {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, headers, body.to_vec()))
}

async fn get_json(router: &Router, uri: &str) -> Result<(StatusCode, Value)> {
    let (status, _, body) = get(router, uri).await?;
    Ok((status, serde_json::from_slice(&body)?))
}

#[tokio::test]
async fn test_first_page_of_25_records() -> Result<()> {
    let app = app()?;

    let (status, json) = get_json(&app.router, "/get_producao_data?start=0&length=10").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["draw"], 1);
    assert_eq!(json["recordsTotal"], 25);
    assert_eq!(json["recordsFiltered"], 25);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(10));
    assert_eq!(json["data"][0]["ID_PRODUTO"], "1");
    assert_eq!(json["data"][0]["NM_PRODUTO"], "Vinho 1");
    assert_eq!(json["data"][0]["VR_PRODUCAO_L"], 1.0);
    Ok(())
}

#[tokio::test]
async fn test_filter_and_draw_are_applied() -> Result<()> {
    let app = app()?;

    let (status, json) = get_json(&app.router, "/get_producao_data?ID_PRODUTO=3&draw=7&length=2").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["draw"], 7);
    assert_eq!(json["recordsTotal"], 25);
    assert_eq!(json["recordsFiltered"], 5);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["data"][1]["DT_ANO"], "2017");
    Ok(())
}

#[tokio::test]
async fn test_malformed_start_is_bad_request() -> Result<()> {
    let app = app()?;

    let (status, json) = get_json(&app.router, "/get_producao_data?start=abc").await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap_or_default().contains("start"));
    Ok(())
}

#[tokio::test]
async fn test_download_is_csv_attachment() -> Result<()> {
    let app = app()?;

    let (status, headers, body) = get(&app.router, "/download_producao").await?;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str()?.starts_with("text/csv"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION].to_str()?,
        "attachment; filename=producao.csv"
    );
    let text = String::from_utf8(body)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("ID_PRODUTO,NM_PRODUTO,DT_ANO,VR_PRODUCAO_L,TIPO_PRODUTO"));
    assert_eq!(lines.next(), Some("1,Vinho 1,2016,1.0,Vinho de Mesa"));
    assert_eq!(text.lines().count(), 26);
    Ok(())
}

#[tokio::test]
async fn test_unavailable_dataset_is_503() -> Result<()> {
    let app = app()?;

    let (status, json) = get_json(&app.router, "/get_exportacao_data").await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_cache_serves_repeat_requests() -> Result<()> {
    let app = app()?;

    get(&app.router, "/get_producao_data").await?;
    get(&app.router, "/download_producao").await?;
    get(&app.router, "/producao").await?;

    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_expired_cache_refetches() -> Result<()> {
    let app = app_with_ttl(Duration::ZERO)?;

    get(&app.router, "/get_producao_data").await?;
    get(&app.router, "/get_producao_data").await?;

    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_dataset_page_lists_filter_values() -> Result<()> {
    let app = app()?;

    let (status, json) = get_json(&app.router, "/producao").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["endpoint"], "/get_producao_data");
    assert_eq!(
        json["filters"]["ID_PRODUTO"],
        serde_json::json!(["1", "2", "3", "4", "5"])
    );
    assert!(json["computed_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_index_apispec_and_health() -> Result<()> {
    let app = app()?;

    let (status, index) = get_json(&app.router, "/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["datasets"].as_array().map(Vec::len), Some(5));

    let (status, spec) = get_json(&app.router, "/apispec.json").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spec["swagger"], "2.0");
    assert!(spec["paths"]["/download_importacao"].is_object());

    let (status, health) = get_json(&app.router, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    // nothing hit the remote side
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 0);
    Ok(())
}
