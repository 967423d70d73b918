//! HTTP route handlers.

use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::cache::LookupError;
use crate::feed::FeedFetcher;

use super::dto::*;
use super::state::AppState;
use super::templates::*;

/// Shown to clients when no course data can be served.
const UNAVAILABLE_MESSAGE: &str = "course data temporarily unavailable";

/// Create the application router.
///
/// `static_dir` is the path to the static assets directory, served under
/// `/public`. Every other unknown path redirects there.
pub fn create_router<F: FeedFetcher>(state: AppState<F>, static_dir: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/availability", get(availability::<F>))
        .nest_service("/public", ServeDir::new(static_dir))
        .fallback(redirect_to_public)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Send unknown paths to the static tree, keeping the query.
async fn redirect_to_public(uri: Uri) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("/public{path}");
    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}

/// Check if request accepts HTML.
fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Seat availability for one course in one term.
pub async fn availability<F: FeedFetcher>(
    State(state): State<AppState<F>>,
    headers: HeaderMap,
    Query(req): Query<AvailabilityRequest>,
) -> Result<Response, AppError> {
    let term = req.term_code();
    let code = req.course_code();
    let html = accepts_html(&headers);
    info!(term = %term, code = %code, html, "availability request");

    let lookup = match state.index.lookup(&term, &code).await {
        Ok(lookup) => lookup,
        Err(e) if html => {
            warn!(error = %e, "no course data to serve");
            let page = ErrorTemplate {
                title: "Unavailable".to_string(),
                message: UNAVAILABLE_MESSAGE.to_string(),
            };
            let body = page.render().map_err(|e| AppError::Internal {
                message: format!("Template error: {}", e),
            })?;
            return Ok((StatusCode::SERVICE_UNAVAILABLE, Html(body)).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    if html {
        let template = AvailabilityTemplate::from_lookup(&lookup);
        let body = template.render().map_err(|e| AppError::Internal {
            message: format!("Template error: {}", e),
        })?;
        Ok(Html(body).into_response())
    } else {
        Ok(Json(AvailabilityResponse::from_lookup(&lookup)).into_response())
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    Unavailable { message: String },
    Internal { message: String },
}

impl From<LookupError> for AppError {
    fn from(e: LookupError) -> Self {
        warn!(error = %e, "no course data to serve");
        AppError::Unavailable {
            message: UNAVAILABLE_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Internal { message } => {
                error!(%message, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CourseIndex, DEFAULT_TTL};
    use crate::domain::TermCode;
    use crate::feed::MockFeedFetcher;
    use axum::http::HeaderValue;

    const FEED: &str = "202310\t10001\tCOMP\t1405\tA\tLecture\t\t\t\t\t\t100\t80\n\
                        202310\t10002\tCOMP\t1405\tB\tLecture\t\t\t\t\t\t100\t120\n\
                        202310\t10003\tMATH\t1104\tA\tLecture\t\t\t\t\t\t50\t10\n";

    fn state_with(fetcher: MockFeedFetcher) -> AppState<MockFeedFetcher> {
        let config = CacheConfig::new(vec![TermCode::new("202310")]);
        AppState::new(CourseIndex::new(fetcher, config))
    }

    fn query(term: &str, dpt: &str, code: &str) -> Query<AvailabilityRequest> {
        Query(AvailabilityRequest {
            term: Some(term.to_string()),
            dpt: Some(dpt.to_string()),
            code: Some(code.to_string()),
        })
    }

    fn html_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        headers
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn accepts_html_checks_accept_header() {
        assert!(accepts_html(&html_headers()));
        assert!(!accepts_html(&HeaderMap::new()));

        let mut json = HeaderMap::new();
        json.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!accepts_html(&json));
    }

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, "ok");
    }

    #[tokio::test]
    async fn unknown_paths_redirect_to_public() {
        let response = redirect_to_public(Uri::from_static("/index.html?x=1")).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/public/index.html?x=1"
        );
    }

    #[tokio::test]
    async fn json_lists_sections_in_feed_order() {
        let state = state_with(MockFeedFetcher::new(FEED));
        let response = availability(State(state), HeaderMap::new(), query("202310", "comp", "1405"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["term"], "202310");
        assert_eq!(json["term_name"], "Winter 2023");
        assert_eq!(json["code"], "COMP1405");
        assert_eq!(json["courses"][0]["crn"], "10001");
        assert_eq!(json["courses"][0]["free"], 20);
        assert_eq!(json["courses"][1]["crn"], "10002");
        assert_eq!(json["courses"][1]["free"], -20);
        assert!(json["stale_error"].is_null());
    }

    #[tokio::test]
    async fn unknown_course_is_empty_list() {
        let state = state_with(MockFeedFetcher::new(FEED));
        let response = availability(State(state), HeaderMap::new(), query("202310", "ZZZZ", "9999"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["courses"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn defaults_to_comp_1405() {
        let state = state_with(MockFeedFetcher::new(FEED));
        let response = availability(
            State(state),
            HeaderMap::new(),
            Query(AvailabilityRequest::default()),
        )
        .await
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["code"], "COMP1405");
        assert_eq!(json["courses"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn html_renders_sections() {
        let state = state_with(MockFeedFetcher::new(FEED));
        let response = availability(State(state), html_headers(), query("202310", "MATH", "1104"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("MATH 1104 A"));
        assert!(body.contains("10003"));
        assert!(body.contains("Winter 2023"));
    }

    #[tokio::test]
    async fn unavailable_without_data_is_503_json() {
        let fetcher = MockFeedFetcher::new(FEED);
        fetcher.set_unavailable(true);
        let state = state_with(fetcher);

        let err = availability(State(state), HeaderMap::new(), query("202310", "COMP", "1405"))
            .await
            .unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"], "course data temporarily unavailable");
    }

    #[tokio::test]
    async fn unavailable_without_data_is_503_html() {
        let fetcher = MockFeedFetcher::new(FEED);
        fetcher.set_unavailable(true);
        let state = state_with(fetcher);

        let response = availability(State(state), html_headers(), query("202310", "COMP", "1405"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.contains("course data temporarily unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_data_carries_warning() {
        let state = state_with(MockFeedFetcher::new(FEED));
        state.index.refresh().await.unwrap();
        state.index.fetcher().set_unavailable(true);
        tokio::time::advance(DEFAULT_TTL + std::time::Duration::from_secs(1)).await;

        let response = availability(State(state), HeaderMap::new(), query("202310", "COMP", "1405"))
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["courses"].as_array().unwrap().len(), 2);
        assert!(
            json["stale_error"]
                .as_str()
                .unwrap()
                .starts_with("course data temporarily unavailable")
        );
    }
}
