//! Route tree and middleware stack.
//!
//! ```text
//! /health                         liveness
//! /health/ready                   readiness
//! /auth/*                         account lifecycle
//! /api/medical-providers          CRUD
//! /api/medical-bills              CRUD + service-event links
//! /api/medical-bill-charges       CRUD
//! /api/explanation-of-benefits    CRUD
//! /api/collection-bills           CRUD
//! /api/medical-service-events     CRUD + bill links
//! /api/medical-bill-payments      CRUD + bill links
//! ```
//!
//! Layers, outermost first: body limit, security headers, CORS, tracing,
//! metrics, rate limiting, error detail rendering, session resolution.

mod auth;
mod bills;
mod charges;
mod collection_bills;
mod crud;
mod eobs;
mod payments;
mod providers;
mod service_events;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    error::ApiError,
    fields::Field,
    health, metrics,
    middleware::{expose_error_details, resolve_session},
    rate_limit,
    state::{ApiSettings, AppState},
};

pub(crate) const BILL_IDS: Field =
    Field::new("medicalBillIds", "Medical bill IDs must be an array");
pub(crate) const EACH_BILL_ID: &str = "Each medical bill ID must be a valid UUID";

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
                                       script-src 'self'; img-src 'self' data: https:";

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.body_limit_bytes;

    let api = Router::new()
        .nest("/medical-providers", providers::router())
        .nest("/medical-bills", bills::router())
        .nest("/medical-bill-charges", charges::router())
        .nest("/explanation-of-benefits", eobs::router())
        .nest("/collection-bills", collection_bills::router())
        .nest("/medical-service-events", service_events::router())
        .nest("/medical-bill-payments", payments::router());

    let router = Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth::router())
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), resolve_session))
        .layer(from_fn_with_state(state.clone(), expose_error_details))
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce))
        .layer(from_fn(metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.settings));

    security_headers(router)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

async fn route_not_found(req: Request) -> ApiError {
    ApiError::RouteNotFound { method: req.method().to_string(), path: req.uri().path().to_string() }
}

fn cors(settings: &ApiSettings) -> CorsLayer {
    let origin = if settings.environment.is_production() {
        AllowOrigin::list(
            settings.allowed_origins.iter().filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    } else {
        AllowOrigin::mirror_request()
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::AUTHORIZATION])
}

fn security_headers(router: Router<AppState>) -> Router<AppState> {
    let headers: [(HeaderName, &'static str); 4] = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
    ];
    headers.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value)))
    })
}
