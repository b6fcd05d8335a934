use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath, Multipart, Path, Request, State},
    http::{Method, Response, StatusCode},
    routing::{get, post},
    Json,
    Router,
};
use bytes::Bytes;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};

use crate::http_objects::{ApiError, BuildResponse};
use crate::orchestrator::Orchestrator;

/// Upload size cap; the deployment can front this with its own policy.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(build_function, download_function_code, health),
    components(schemas(ApiError, BuildResponse, BuildUploadType)),
    tags(
        (name = "forge", description = "Function image build API")
    )
)]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/docs/openapi.json", get(openapi_json))
        .route("/health", get(health))
        .route(
            "/build",
            post(build_function).with_state(route_state.clone()),
        )
        .route(
            "/functions/{name}/code",
            get(download_function_code).with_state(route_state.clone()),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "forge",
    responses(
        (status = 200, description = "Service is healthy")
    ),
)]
async fn health() -> &'static str {
    "OK"
}

#[allow(dead_code)]
#[derive(ToSchema)]
struct BuildUploadType {
    name: String,
    #[schema(format = "binary")]
    file: String,
}

/// Build a function image from an uploaded source bundle
#[utoipa::path(
    post,
    path = "/build",
    tag = "forge",
    request_body(content_type = "multipart/form-data", content = inline(BuildUploadType)),
    responses(
        (status = 201, description = "Image built and pushed", body = BuildResponse),
        (status = BAD_REQUEST, description = "Invalid name or unreadable archive", body = ApiError),
        (status = INTERNAL_SERVER_ERROR, description = "Pipeline failure with stage tag", body = ApiError)
    ),
)]
async fn build_function(
    State(state): State<RouteState>,
    mut form: Multipart,
) -> Result<(StatusCode, Json<BuildResponse>), ApiError> {
    let mut name: Option<String> = None;
    let mut archive: Option<Bytes> = None;

    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(&e.to_string()))?
    {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(&e.to_string()))?;
                name = Some(text);
            }
            Some("file") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(&e.to_string()))?;
                archive = Some(data);
            }
            _ => {}
        }
    }

    let name = name.ok_or(crate::error::BuildError::MissingField("name"))?;
    let archive = archive.ok_or(crate::error::BuildError::MissingField("file"))?;

    let outcome = state.orchestrator.build(&name, &archive).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Download the source of a previously built function
#[utoipa::path(
    get,
    path = "/functions/{name}/code",
    tag = "forge",
    params(
        ("name" = String, Path, description = "Function name")
    ),
    responses(
        (status = 200, description = "Zip archive of the function source", content_type = "application/zip"),
        (status = NOT_FOUND, description = "No image for this function", body = ApiError),
        (status = INTERNAL_SERVER_ERROR, description = "Extraction failure", body = ApiError)
    ),
)]
async fn download_function_code(
    Path(name): Path<String>,
    State(state): State<RouteState>,
) -> Result<Response<Body>, ApiError> {
    let archive = state.orchestrator.retrieve(&name).await?;

    Response::builder()
        .header("Content-Type", "application/zip")
        .header("Content-Length", archive.bytes.len().to_string())
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", archive.file_name),
        )
        .body(Body::from(archive.bytes))
        .map_err(|e| ApiError::internal_error_str(&e.to_string()))
}
