use crate::{
    config::CheckoutConfig,
    db::with_transaction,
    entities::{
        commerce::{cart, cart_item, customer_address, Cart, CartItem, CustomerAddress, Product,
            ProductVariant},
        order, order_item, payment, OrderStatus, PaymentStatus,
    },
    events::{Event, EventSender},
    services::commerce::{
        order_number::{OrderNumberGenerator, TimestampOrderNumberGenerator},
        pricing::{
            format_money, line_total, round_money, OrderTotals, PricingPolicy, TaxCalculator,
        },
    },
};
use axum::http::StatusCode;
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Body of `POST /api/v1/orders`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub shipping_address_id: Uuid,
    /// Defaults to the shipping address
    pub billing_address_id: Option<Uuid>,
    #[validate(length(
        min = 1,
        max = 64,
        message = "Payment method must be between 1 and 64 characters"
    ))]
    #[schema(example = "Cash on Delivery")]
    pub payment_method: String,
    #[validate(length(max = 2000, message = "Customer note cannot exceed 2000 characters"))]
    pub customer_note: Option<String>,
}

/// Parsed payment method. The caller's wording is stored verbatim elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    CashOnDelivery,
    Other(String),
}

impl PaymentMethod {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("cash on delivery") || trimmed.eq_ignore_ascii_case("cod")
        {
            PaymentMethod::CashOnDelivery
        } else {
            PaymentMethod::Other(trimmed.to_string())
        }
    }

    /// Recorded in payment metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Other(_) => "online",
        }
    }

    /// Initial payment state. Every method starts out pending; settlement is
    /// recorded later by whoever processes the payment.
    pub fn initial_status(&self) -> PaymentStatus {
        PaymentStatus::Pending
    }
}

/// Validated checkout input for one customer
#[derive(Debug, Clone)]
pub struct CheckoutCommand {
    pub customer_id: Uuid,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub payment_method_label: String,
    pub payment_method: PaymentMethod,
    pub customer_note: Option<String>,
}

impl CheckoutCommand {
    pub fn from_request(customer_id: Uuid, req: CreateOrderRequest) -> Result<Self, CheckoutError> {
        req.validate()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        Ok(Self {
            customer_id,
            shipping_address_id: req.shipping_address_id,
            billing_address_id: req.billing_address_id.unwrap_or(req.shipping_address_id),
            payment_method: PaymentMethod::parse(&req.payment_method),
            payment_method_label: req.payment_method,
            customer_note: req.customer_note,
        })
    }
}

/// Stable, machine-readable checkout failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutErrorCode {
    Unauthorized,
    ValidationError,
    EmptyCart,
    InvalidAddress,
    CartModified,
    PersistenceFailure,
}

impl CheckoutErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::EmptyCart => "EMPTY_CART",
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::CartModified => "CART_MODIFIED",
            Self::PersistenceFailure => "PERSISTENCE_FAILURE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::EmptyCart | Self::InvalidAddress => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CartModified => StatusCode::CONFLICT,
            Self::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid {0} address")]
    InvalidAddress(&'static str),

    #[error("Cart changed during checkout")]
    CartModified,

    #[error("Order number {0} already taken")]
    DuplicateOrderNumber(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl From<DbErr> for CheckoutError {
    fn from(err: DbErr) -> Self {
        CheckoutError::Persistence(err.to_string())
    }
}

impl CheckoutError {
    pub fn code(&self) -> CheckoutErrorCode {
        match self {
            Self::Unauthorized => CheckoutErrorCode::Unauthorized,
            Self::Validation(_) => CheckoutErrorCode::ValidationError,
            Self::EmptyCart => CheckoutErrorCode::EmptyCart,
            Self::InvalidAddress(_) => CheckoutErrorCode::InvalidAddress,
            Self::CartModified => CheckoutErrorCode::CartModified,
            Self::DuplicateOrderNumber(_) | Self::Persistence(_) => {
                CheckoutErrorCode::PersistenceFailure
            }
        }
    }

    /// Message safe to show the caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::DuplicateOrderNumber(_) | Self::Persistence(_) => {
                "Failed to create order".to_string()
            }
            Self::CartModified => {
                "Cart was modified during checkout; review the cart and try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Identifier, number and total of a newly created order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "550e8400-e29b-41d4-a716-446655440000",
    "order_number": "ORD-20260109103000-7K2QZD",
    "total": "105.00"
}))]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    /// Exact decimal rendered with two places
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderError {
    pub code: CheckoutErrorCode,
    pub message: String,
}

/// Outcome of a checkout attempt. Failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CreateOrderError>,
}

impl CreateOrderResult {
    pub fn created(order: OrderSummary) -> Self {
        Self {
            success: true,
            order: Some(order),
            error: None,
        }
    }

    pub fn failed(err: &CheckoutError) -> Self {
        Self {
            success: false,
            order: None,
            error: Some(CreateOrderError {
                code: err.code(),
                message: err.public_message(),
            }),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.error {
            None => StatusCode::CREATED,
            Some(err) => err.code.status_code(),
        }
    }
}

/// One cart line frozen for order creation
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Everything read before the write transaction, including the cart version
/// the transaction must still find.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub customer_id: Uuid,
    pub cart_id: Uuid,
    pub cart_version: i32,
    pub currency: String,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub payment_method_label: String,
    pub payment_method: PaymentMethod,
    pub customer_note: Option<String>,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
}

/// Converts a customer's cart into an order.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    pricing: PricingPolicy,
    order_numbers: Arc<dyn OrderNumberGenerator>,
    max_order_number_attempts: u32,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &CheckoutConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            pricing: PricingPolicy::from_config(config),
            order_numbers: Arc::new(TimestampOrderNumberGenerator::new(
                config.order_number_prefix.clone(),
            )),
            max_order_number_attempts: config.order_number_max_attempts.max(1),
        }
    }

    pub fn with_order_number_generator(mut self, generator: Arc<dyn OrderNumberGenerator>) -> Self {
        self.order_numbers = generator;
        self
    }

    pub fn with_tax_calculator(mut self, tax: Arc<dyn TaxCalculator>) -> Self {
        self.pricing.tax = tax;
        self
    }

    /// Service boundary for checkout: every failure becomes a structured
    /// result and is logged here.
    #[instrument(skip(self, req), fields(customer_id = ?customer_id))]
    pub async fn create_order(
        &self,
        customer_id: Option<Uuid>,
        req: CreateOrderRequest,
    ) -> CreateOrderResult {
        let outcome = match customer_id {
            None => Err(CheckoutError::Unauthorized),
            Some(customer_id) => match CheckoutCommand::from_request(customer_id, req) {
                Ok(cmd) => self.try_create_order(cmd).await,
                Err(e) => Err(e),
            },
        };

        match outcome {
            Ok(summary) => CreateOrderResult::created(summary),
            Err(err) => {
                let code = err.code();
                if code == CheckoutErrorCode::PersistenceFailure {
                    error!(error = %err, code = code.as_str(), "failed to create order");
                } else {
                    warn!(error = %err, code = code.as_str(), "order rejected");
                }
                counter!("checkout.failures", 1, "code" => code.as_str());
                CreateOrderResult::failed(&err)
            }
        }
    }

    /// Checkout with typed errors: snapshot, then persist atomically.
    pub async fn try_create_order(
        &self,
        cmd: CheckoutCommand,
    ) -> Result<OrderSummary, CheckoutError> {
        let plan = self.prepare(&cmd).await?;
        self.place(plan).await
    }

    /// Reads the cart, verifies address ownership and prices the order.
    /// Nothing is written.
    #[instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id))]
    pub async fn prepare(&self, cmd: &CheckoutCommand) -> Result<CheckoutPlan, CheckoutError> {
        let db = &*self.db;

        let cart = Cart::find()
            .filter(cart::Column::CustomerId.eq(cmd.customer_id))
            .one(db)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(ProductVariant)
            .all(db)
            .await?;
        if rows.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.ensure_address_owned(cmd.customer_id, cmd.shipping_address_id, "shipping")
            .await?;
        if cmd.billing_address_id != cmd.shipping_address_id {
            self.ensure_address_owned(cmd.customer_id, cmd.billing_address_id, "billing")
                .await?;
        }

        let product_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|(_, variant)| variant.as_ref().map(|v| v.product_id))
            .collect();
        let product_names: HashMap<Uuid, String> = Product::find()
            .filter(crate::entities::product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut lines = Vec::with_capacity(rows.len());
        for (item, variant) in rows {
            let variant = variant.ok_or_else(|| {
                CheckoutError::Persistence(format!(
                    "cart item {} references missing variant {}",
                    item.id, item.variant_id
                ))
            })?;
            let product_name = product_names
                .get(&variant.product_id)
                .cloned()
                .unwrap_or_else(|| variant.name.clone());

            let unit_price = round_money(item.unit_price);
            lines.push(OrderLine {
                variant_id: variant.id,
                product_name,
                variant_name: variant.name,
                sku: variant.sku,
                quantity: item.quantity,
                unit_price,
                line_total: line_total(unit_price, item.quantity),
            });
        }

        let totals = self
            .pricing
            .totals(lines.iter().map(|l| (l.unit_price, l.quantity)));

        Ok(CheckoutPlan {
            customer_id: cmd.customer_id,
            cart_id: cart.id,
            cart_version: cart.version,
            currency: cart.currency,
            shipping_address_id: cmd.shipping_address_id,
            billing_address_id: cmd.billing_address_id,
            payment_method_label: cmd.payment_method_label.clone(),
            payment_method: cmd.payment_method.clone(),
            customer_note: cmd.customer_note.clone(),
            lines,
            totals,
        })
    }

    /// Writes order, items and payment and clears the cart in one
    /// transaction. A taken order number rolls everything back and the whole
    /// transaction runs again with a new number.
    #[instrument(skip(self, plan), fields(customer_id = %plan.customer_id, cart_id = %plan.cart_id))]
    pub async fn place(&self, plan: CheckoutPlan) -> Result<OrderSummary, CheckoutError> {
        let mut attempt = 1;
        loop {
            let order_number = self.order_numbers.generate();
            let attempt_plan = plan.clone();
            let attempt_number = order_number.clone();

            let result = with_transaction(&self.db, move |txn| {
                Box::pin(async move { persist_order(txn, &attempt_plan, &attempt_number).await })
            })
            .await;

            match result {
                Ok(order_id) => {
                    let summary = OrderSummary {
                        id: order_id,
                        order_number,
                        total: format_money(plan.totals.total),
                    };
                    self.after_commit(&plan, &summary).await;
                    return Ok(summary);
                }
                Err(CheckoutError::DuplicateOrderNumber(number))
                    if attempt < self.max_order_number_attempts =>
                {
                    warn!(order_number = %number, attempt, "order number collision; retrying");
                    counter!("checkout.order_number_retries", 1);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn ensure_address_owned(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
        role: &'static str,
    ) -> Result<(), CheckoutError> {
        let address = CustomerAddress::find_by_id(address_id)
            .filter(customer_address::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?;

        match address {
            Some(_) => Ok(()),
            None => Err(CheckoutError::InvalidAddress(role)),
        }
    }

    async fn after_commit(&self, plan: &CheckoutPlan, summary: &OrderSummary) {
        counter!("checkout.orders_created", 1);
        info!(
            order_id = %summary.id,
            order_number = %summary.order_number,
            total = %summary.total,
            customer_id = %plan.customer_id,
            items = plan.lines.len(),
            "order created"
        );

        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: summary.id,
                customer_id: plan.customer_id,
                order_number: summary.order_number.clone(),
                total: plan.totals.total,
            })
            .await;
        self.event_sender
            .send_or_log(Event::CartUpdated {
                cart_id: plan.cart_id,
                customer_id: plan.customer_id,
                version: plan.cart_version + 1,
            })
            .await;
    }
}

async fn persist_order(
    txn: &DatabaseTransaction,
    plan: &CheckoutPlan,
    order_number: &str,
) -> Result<Uuid, CheckoutError> {
    let now = Utc::now();

    // Claim the cart at the version we priced; anyone else who touched it
    // since then wins.
    let claimed = Cart::update_many()
        .col_expr(
            cart::Column::Version,
            Expr::col(cart::Column::Version).add(1),
        )
        .col_expr(cart::Column::UpdatedAt, Expr::value(now))
        .filter(cart::Column::Id.eq(plan.cart_id))
        .filter(cart::Column::Version.eq(plan.cart_version))
        .exec(txn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(CheckoutError::CartModified);
    }

    let order_id = Uuid::new_v4();
    let new_order = order::ActiveModel {
        id: Set(order_id),
        order_number: Set(order_number.to_string()),
        customer_id: Set(plan.customer_id),
        status: Set(OrderStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        subtotal: Set(plan.totals.subtotal),
        shipping_cost: Set(plan.totals.shipping_cost),
        tax: Set(plan.totals.tax),
        total: Set(plan.totals.total),
        currency: Set(plan.currency.clone()),
        payment_method: Set(plan.payment_method_label.clone()),
        shipping_address_id: Set(plan.shipping_address_id),
        billing_address_id: Set(plan.billing_address_id),
        customer_note: Set(plan.customer_note.clone()),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    };
    order::Entity::insert(new_order)
        .exec_without_returning(txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                CheckoutError::DuplicateOrderNumber(order_number.to_string())
            }
            _ => CheckoutError::from(e),
        })?;

    let items: Vec<order_item::ActiveModel> = plan
        .lines
        .iter()
        .map(|line| order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            variant_id: Set(line.variant_id),
            product_name: Set(line.product_name.clone()),
            variant_name: Set(line.variant_name.clone()),
            sku: Set(line.sku.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            line_total: Set(line.line_total),
            created_at: Set(now),
        })
        .collect();
    order_item::Entity::insert_many(items)
        .exec_without_returning(txn)
        .await?;

    payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        amount: Set(plan.totals.total),
        currency: Set(plan.currency.clone()),
        status: Set(plan.payment_method.initial_status()),
        payment_method: Set(plan.payment_method_label.clone()),
        metadata: Set(Some(serde_json::json!({
            "method_kind": plan.payment_method.kind(),
        }))),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await?;

    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(plan.cart_id))
        .exec(txn)
        .await?;

    Ok(order_id)
}
