#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseBackend as DbBackend, DatabaseConnection, Set,
    Statement,
};
use serde_json::Value;
use storefront_orders::{
    auth::ADMIN_ROLE,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{
        commerce::{customer_address, product_variant},
        product,
    },
    events::{self, Event, EventSender},
    services::{commerce::AddToCartInput, CartService, CheckoutService, OrderService},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Fresh in-memory SQLite database with migrations applied.
///
/// A single pooled connection keeps every query on the same in-memory
/// database.
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .expect("failed to create test database");

    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");

    Arc::new(pool)
}

/// Event sender whose receiver is handed back for assertions.
pub fn event_channel() -> (Arc<EventSender>, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(256);
    (Arc::new(EventSender::new(tx)), rx)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.cors_allow_any_origin = true;
    cfg
}

/// Services wired against one database, without HTTP.
pub struct TestServices {
    pub db: Arc<DatabaseConnection>,
    pub sender: Arc<EventSender>,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub events: mpsc::Receiver<Event>,
}

impl TestServices {
    pub async fn new() -> Self {
        let db = setup_db().await;
        let (sender, events) = event_channel();
        let cfg = test_config();

        Self {
            carts: CartService::new(db.clone(), sender.clone(), cfg.checkout.currency.clone()),
            checkout: CheckoutService::new(db.clone(), sender.clone(), &cfg.checkout),
            orders: OrderService::new(db.clone(), sender.clone()),
            sender,
            db,
            events,
        }
    }

    /// Drains whatever events have been published so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Puts `quantity` of a freshly seeded variant into the customer's cart.
    pub async fn add_to_cart(
        &self,
        customer_id: Uuid,
        sku: &str,
        price: Decimal,
        quantity: i32,
    ) -> product_variant::Model {
        let variant = seed_variant(&*self.db, sku, price).await;
        self.carts
            .add_item(
                customer_id,
                AddToCartInput {
                    variant_id: variant.id,
                    quantity,
                },
            )
            .await
            .expect("add item to cart");
        variant
    }
}

/// Helper harness for driving the full router against an in-memory database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub customer_id: Uuid,
    pub admin_id: Uuid,
    customer_token: String,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = setup_db().await;
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(db, test_config(), EventSender::new(event_tx));
        let router =
            storefront_orders::app_router(state.clone()).expect("cors configuration for tests");

        let customer_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();
        let customer_token = state
            .auth
            .issue_token(customer_id, &[])
            .expect("issue customer token");
        let admin_token = state
            .auth
            .issue_token(admin_id, &[ADMIN_ROLE])
            .expect("issue admin token");

        Self {
            router,
            state,
            customer_id,
            admin_id,
            customer_token,
            admin_token,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub fn customer_token(&self) -> &str {
        &self.customer_token
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, &[])
            .expect("issue token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_customer(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(self.customer_token()))
            .await
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(self.admin_token()))
            .await
    }

    /// Puts `quantity` of a freshly seeded variant into the customer's cart.
    pub async fn fill_cart(&self, customer_id: Uuid, sku: &str, price: Decimal, quantity: i32) {
        let variant = seed_variant(self.db(), sku, price).await;
        self.state
            .services
            .carts
            .add_item(
                customer_id,
                AddToCartInput {
                    variant_id: variant.id,
                    quantity,
                },
            )
            .await
            .expect("add item to cart");
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Seeds a product with a single variant named after `sku`.
pub async fn seed_variant<C: ConnectionTrait>(
    db: &C,
    sku: &str,
    price: Decimal,
) -> product_variant::Model {
    let now = Utc::now();
    let product = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Product {}", sku)),
        description: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed product");

    product_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        sku: Set(sku.to_string()),
        name: Set(format!("Variant {}", sku)),
        price: Set(price),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed product variant")
}

pub async fn seed_address<C: ConnectionTrait>(
    db: &C,
    customer_id: Uuid,
) -> customer_address::Model {
    let now = Utc::now();
    customer_address::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        name: Set("Jane Doe".to_string()),
        phone: Set(Some("+1 555 0100".to_string())),
        address_line_1: Set("1 Market Street".to_string()),
        address_line_2: Set(None),
        city: Set("Springfield".to_string()),
        province: Set("IL".to_string()),
        postal_code: Set("62701".to_string()),
        country_code: Set("US".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed customer address")
}

/// Makes any delete from `cart_items` fail, so the checkout transaction
/// aborts on its last write.
pub async fn fail_cart_clearing<C: ConnectionTrait>(db: &C) {
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE TRIGGER fail_cart_clear BEFORE DELETE ON cart_items \
         BEGIN SELECT RAISE(ABORT, 'cart clearing disabled'); END;"
            .to_string(),
    ))
    .await
    .expect("create failing trigger");
}
