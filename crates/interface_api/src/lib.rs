//! HTTP API Layer
//!
//! This crate provides the REST API for the school fees core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for vote heads, schedules, payments and M-PESA
//! - **Middleware**: Authentication, tenant scoping, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! Every `/api/v1` route is scoped to the school named in the caller's
//! token. The M-PESA C2B callbacks are public and always answer HTTP 200.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(store, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_fees::{
    BalanceService, FeeAdministration, FeeStorePort, PaymentReconciler, PaymentService,
};

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{finance, health, mpesa, schedules, vote_heads};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FeeStorePort>,
    pub config: ApiConfig,
    pub admin: Arc<FeeAdministration>,
    pub payments: Arc<PaymentService>,
    pub balances: Arc<BalanceService>,
    pub reconciler: Arc<PaymentReconciler>,
}

impl AppState {
    pub fn new(store: Arc<dyn FeeStorePort>, config: ApiConfig) -> Self {
        Self {
            admin: Arc::new(FeeAdministration::new(store.clone())),
            payments: Arc::new(PaymentService::new(store.clone())),
            balances: Arc::new(BalanceService::new(store.clone())),
            reconciler: Arc::new(PaymentReconciler::new(store.clone())),
            store,
            config,
        }
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `store` - Fee store backing every service
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(store: Arc<dyn FeeStorePort>, config: ApiConfig) -> Router {
    let state = AppState::new(store, config);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/mpesa/c2b/validation", post(mpesa::c2b_validation))
        .route("/mpesa/c2b/confirmation", post(mpesa::c2b_confirmation));

    let vote_head_routes = Router::new()
        .route("/", get(vote_heads::list_vote_heads).post(vote_heads::create_vote_head))
        .route("/reorder", put(vote_heads::reorder_vote_heads))
        .route(
            "/:id",
            put(vote_heads::update_vote_head).delete(vote_heads::deactivate_vote_head),
        );

    let schedule_routes = Router::new()
        .route("/", post(schedules::create_schedule))
        .route(
            "/:id/items",
            get(schedules::list_schedule_items).post(schedules::add_schedule_item),
        );

    let payment_routes = Router::new()
        .route("/", get(finance::list_payments).post(finance::record_payment))
        .route("/:id", get(finance::get_receipt));

    let student_routes = Router::new()
        .route("/:id/balances", get(finance::student_balances))
        .route("/:id/balances/reinitialize", post(finance::reinitialize_balances));

    let mpesa_routes = Router::new()
        .route("/transactions", get(mpesa::list_transactions))
        .route("/transactions/:id/match", post(mpesa::manual_match));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/vote-heads", vote_head_routes)
        .nest("/fee-schedules", schedule_routes)
        .nest("/payments", payment_routes)
        .nest("/students", student_routes)
        .nest("/mpesa", mpesa_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
