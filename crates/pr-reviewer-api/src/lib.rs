//! JSON REST API for the PR reviewer service.
//!
//! Exposes an axum [`Router`] backed by any [`Transactor`]. TLS and listener
//! setup are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = pr_reviewer_api::app(service, Duration::from_secs(5));
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod pull_requests;
pub mod requests;
pub mod stats;
pub mod teams;
pub mod users;
pub mod validate;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  extract::Request,
  http::StatusCode,
  routing::{get, post},
};
use pr_reviewer_core::{ReviewService, store::Transactor};
use tower::ServiceBuilder;
use tower_http::{
  request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
  timeout::TimeoutLayer,
  trace::TraceLayer,
};
use tracing::{Span, info_span};

pub use error::ApiError;

const REQUEST_ID: &str = "x-request-id";

/// Build the bare API router for `service`, without middleware.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<D>(service: Arc<ReviewService<D>>) -> Router<()>
where
  D: Transactor + 'static,
{
  Router::new()
    // Teams
    .route("/team/add", post(teams::add::<D>))
    .route("/team/get", get(teams::get::<D>))
    .route("/team/deactivate", post(teams::deactivate::<D>))
    // Users
    .route("/users/setIsActive", post(users::set_is_active::<D>))
    .route("/users/getReview", get(users::get_review::<D>))
    // Pull requests
    .route("/pullRequest/create", post(pull_requests::create::<D>))
    .route("/pullRequest/merge", post(pull_requests::merge::<D>))
    .route("/pullRequest/reassign", post(pull_requests::reassign::<D>))
    .route("/pullRequest/get", get(pull_requests::get::<D>))
    // Reporting
    .route("/stats", get(stats::stats::<D>))
    .route("/health", get(stats::health))
    .with_state(service)
}

/// The API router wrapped in request-id, tracing, and timeout middleware.
///
/// Requests without an `x-request-id` header get a fresh UUID; the id is
/// recorded on the request span and echoed on the response. A request that
/// outlives `request_timeout` is answered with 503.
pub fn app<D>(service: Arc<ReviewService<D>>, request_timeout: Duration) -> Router<()>
where
  D: Transactor + 'static,
{
  let middleware = ServiceBuilder::new()
    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    .layer(TraceLayer::new_for_http().make_span_with(request_span))
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(TimeoutLayer::with_status_code(StatusCode::SERVICE_UNAVAILABLE, request_timeout));

  api_router(service).layer(middleware)
}

fn request_span(req: &Request) -> Span {
  let request_id = req
    .headers()
    .get(REQUEST_ID)
    .and_then(|v| v.to_str().ok())
    .unwrap_or("-");
  info_span!("request", method = %req.method(), uri = %req.uri(), request_id)
}
