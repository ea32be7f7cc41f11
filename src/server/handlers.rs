use super::query::GridRequest;
use super::AppState;
use crate::error::PipelineError;
use crate::observability::metrics;
use crate::pipeline::Dataset;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{error, warn};

/// Errors surfaced to HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Pipeline(e @ PipelineError::SourceUnavailable { .. }) => {
                warn!(error = %e, "Dataset unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Pipeline(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "vitibrasil_api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics_text() -> Response {
    match metrics::render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Index of datasets and their endpoints.
pub async fn index() -> impl IntoResponse {
    let datasets: Vec<Value> = Dataset::ALL
        .iter()
        .map(|dataset| {
            json!({
                "name": dataset.slug(),
                "title": dataset.title(),
                "page": page_path(*dataset),
                "data": data_path(*dataset),
                "download": download_path(*dataset),
            })
        })
        .collect();

    Json(json!({
        "service": "vitibrasil_api",
        "datasets": datasets,
        "apispec": "/apispec.json",
    }))
}

/// Full dataset as a CSV attachment.
pub async fn download(state: AppState, dataset: Dataset) -> ApiResult<Response> {
    let table = state.table(dataset).await?;

    let mut body: Vec<u8> = Vec::new();
    table.write_csv(&mut body)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", dataset.csv_file_name()),
            ),
        ],
        body,
    )
        .into_response())
}

/// Filtered, paginated grid data.
pub async fn grid_data(
    state: AppState,
    dataset: Dataset,
    params: HashMap<String, String>,
) -> ApiResult<Response> {
    let request = GridRequest::from_params(dataset, &params).map_err(ApiError::BadRequest)?;
    let table = state.table(dataset).await?;
    Ok(Json(request.page(&table)).into_response())
}

/// Description of a dataset page: its endpoints and the choices of every
/// filter field.
pub async fn dataset_page(state: AppState, dataset: Dataset) -> ApiResult<Response> {
    let table = state.table(dataset).await?;

    let mut filters = Map::new();
    for field in dataset.filter_fields() {
        let mut values = table.distinct(field);
        values.sort();
        filters.insert(field.to_string(), json!(values));
    }

    Ok(Json(json!({
        "title": dataset.title(),
        "dataset": dataset.slug(),
        "endpoint": data_path(dataset),
        "download": download_path(dataset),
        "columns": table.columns,
        "filters": filters,
        "computed_at": state.cache.computed_at(dataset).await.map(|at| at.to_rfc3339()),
    }))
    .into_response())
}

/// Swagger 2.0 description of every route.
pub async fn apispec() -> impl IntoResponse {
    Json(api_spec())
}

pub fn api_spec() -> Value {
    let mut paths = Map::new();

    for dataset in Dataset::ALL {
        let mut parameters = vec![
            query_param("start", "integer", "Index of the first record (default 0)"),
            query_param("length", "integer", "Number of records (default 10)"),
            query_param("draw", "integer", "Echoed back in the response (default 1)"),
        ];
        for field in dataset.filter_fields() {
            parameters.push(query_param(field, "string", "Equality filter"));
        }

        paths.insert(
            data_path(dataset),
            json!({
                "get": {
                    "tags": [dataset.slug()],
                    "summary": format!("{} data, filtered and paginated", dataset.title()),
                    "produces": ["application/json"],
                    "parameters": parameters,
                    "responses": {
                        "200": {
                            "description": "Grid page",
                            "schema": { "$ref": "#/definitions/GridPage" }
                        },
                        "400": { "description": "Malformed paging parameter" },
                        "503": { "description": "Remote source and local snapshot unavailable" }
                    }
                }
            }),
        );
        paths.insert(
            download_path(dataset),
            json!({
                "get": {
                    "tags": [dataset.slug()],
                    "summary": format!("Download the full {} table as CSV", dataset.title()),
                    "produces": ["text/csv"],
                    "responses": {
                        "200": { "description": "CSV attachment" },
                        "503": { "description": "Remote source and local snapshot unavailable" }
                    }
                }
            }),
        );
    }

    json!({
        "swagger": "2.0",
        "info": {
            "title": "Vitibrasil API",
            "description": "Normalized Brazilian viticulture statistics",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "basePath": "/",
        "paths": paths,
        "definitions": {
            "GridPage": {
                "type": "object",
                "properties": {
                    "draw": { "type": "integer" },
                    "recordsTotal": { "type": "integer" },
                    "recordsFiltered": { "type": "integer" },
                    "data": { "type": "array", "items": { "type": "object" } }
                }
            }
        }
    })
}

fn query_param(name: &str, kind: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "type": kind,
        "required": false,
        "description": description,
    })
}

pub fn data_path(dataset: Dataset) -> String {
    format!("/get_{}_data", dataset.slug())
}

pub fn download_path(dataset: Dataset) -> String {
    format!("/download_{}", dataset.slug())
}

pub fn page_path(dataset: Dataset) -> String {
    format!("/{}", dataset.slug())
}
