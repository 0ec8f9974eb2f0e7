//! Storefront order service
//!
//! Turns a customer's cart into an immutable, fully priced order and exposes
//! cart, order history and back-office order management over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{middleware, routing::get, Router};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    auth::{auth_middleware, AuthConfig, AuthService},
    config::AppConfig,
    events::EventSender,
    services::{CartService, CheckoutService, OrderService},
};

/// Services used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                &config.checkout,
            )),
            carts: Arc::new(CartService::new(
                db.clone(),
                event_sender.clone(),
                config.checkout.currency.clone(),
            )),
            orders: Arc::new(OrderService::new(db, event_sender)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig, event_sender: EventSender) -> Self {
        let event_sender = Arc::new(event_sender);
        let services = AppServices::new(db.clone(), event_sender.clone(), &config);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));

        Self {
            db,
            config: Arc::new(config),
            event_sender,
            auth,
            services,
        }
    }

    /// Swaps the checkout service, e.g. for one with a custom order number
    /// generator.
    pub fn with_checkout_service(mut self, checkout: CheckoutService) -> Self {
        self.services.checkout = Arc::new(checkout);
        self
    }
}

/// Versioned API routes, mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::orders::orders_routes())
        .merge(handlers::cart::cart_routes())
        .nest("/admin", handlers::admin::admin_routes())
}

#[derive(Debug, thiserror::Error)]
#[error("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true")]
pub struct CorsConfigError;

/// Explicit origins win; otherwise permissive CORS is allowed only in
/// development or when explicitly enabled.
pub fn build_cors_layer(cfg: &AppConfig) -> Result<CorsLayer, CorsConfigError> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        Err(CorsConfigError)
    }
}

/// Full application router: health, API, docs and the middleware stack.
pub fn app_router(state: AppState) -> Result<Router, CorsConfigError> {
    let cors_layer = build_cors_layer(&state.config)?;

    Ok(Router::<AppState>::new()
        .route("/health", get(handlers::health::health_check))
        .nest(
            "/api/v1",
            api_v1_routes().layer(middleware::from_fn_with_state(
                state.auth.clone(),
                auth_middleware,
            )),
        )
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors_layer)
        .layer(middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state))
}
