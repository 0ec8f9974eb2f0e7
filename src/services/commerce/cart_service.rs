use crate::{
    entities::commerce::{cart, cart_item, Cart, CartItem, CartModel, ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::pricing::{format_money, line_total, round_money},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// Input for adding a variant to the current customer's cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub variant_id: Uuid,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    /// Zero removes the line
    #[validate(range(min = 0, max = 999, message = "Quantity must be between 0 and 999"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLineView {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// The customer's cart as shown to them. A customer who has never added
/// anything gets an empty view with no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub id: Option<Uuid>,
    pub version: i32,
    pub currency: String,
    pub items: Vec<CartLineView>,
    pub subtotal: String,
}

/// Per-customer cart operations.
///
/// Every mutation bumps `carts.version` in the same transaction, which is
/// what lets checkout detect a cart that changed under it.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            db,
            event_sender,
            currency: currency.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let db = &*self.db;

        let Some(cart) = find_cart(db, customer_id).await? else {
            return Ok(CartView {
                id: None,
                version: 0,
                currency: self.currency.clone(),
                items: Vec::new(),
                subtotal: format_money(Decimal::ZERO),
            });
        };

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(ProductVariant)
            .all(db)
            .await?;

        let mut subtotal = Decimal::ZERO;
        let items = rows
            .into_iter()
            .map(|(item, variant)| {
                let total = line_total(item.unit_price, item.quantity);
                subtotal += total;
                let (sku, name) = variant
                    .map(|v| (v.sku, v.name))
                    .unwrap_or_default();
                CartLineView {
                    id: item.id,
                    variant_id: item.variant_id,
                    sku,
                    name,
                    quantity: item.quantity,
                    unit_price: format_money(item.unit_price),
                    line_total: format_money(total),
                }
            })
            .collect();

        Ok(CartView {
            id: Some(cart.id),
            version: cart.version,
            currency: cart.currency,
            items,
            subtotal: format_money(subtotal),
        })
    }

    /// Adds a variant, creating the cart on first use. The variant's current
    /// price, rounded to minor units, is captured on a new line; adding a variant already in the cart
    /// increases that line's quantity and keeps its captured price.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let variant = ProductVariant::find_by_id(input.variant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Variant {} not found", input.variant_id))
            })?;

        let cart = match find_cart(&txn, customer_id).await? {
            Some(cart) => cart,
            None => {
                let now = Utc::now();
                cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    currency: Set(self.currency.clone()),
                    version: Set(0),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let existing_item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::VariantId.eq(input.variant_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing_item {
            let quantity = item
                .quantity
                .checked_add(input.quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "quantity: line would hold more than {} units",
                        MAX_LINE_QUANTITY
                    ))
                })?;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                variant_id: Set(variant.id),
                quantity: Set(input.quantity),
                unit_price: Set(round_money(variant.price)),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        let cart = bump_cart_version(&txn, cart).await?;
        txn.commit().await?;

        info!(
            cart_id = %cart.id,
            variant_id = %input.variant_id,
            quantity = input.quantity,
            "added item to cart"
        );
        self.cart_updated(&cart).await;

        self.get_cart(customer_id).await
    }

    /// Sets a line's quantity; zero removes the line.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        UpdateCartItemInput { quantity }.validate()?;

        let txn = self.db.begin().await?;
        let (cart, item) = find_owned_item(&txn, customer_id, item_id).await?;

        if quantity == 0 {
            CartItem::delete_by_id(item.id).exec(&txn).await?;
        } else {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        }

        let cart = bump_cart_version(&txn, cart).await?;
        txn.commit().await?;

        self.cart_updated(&cart).await;
        self.get_cart(customer_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, item) = find_owned_item(&txn, customer_id, item_id).await?;

        CartItem::delete_by_id(item.id).exec(&txn).await?;
        let cart = bump_cart_version(&txn, cart).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, %item_id, "removed item from cart");
        self.cart_updated(&cart).await;
        self.get_cart(customer_id).await
    }

    async fn cart_updated(&self, cart: &CartModel) {
        self.event_sender
            .send_or_log(Event::CartUpdated {
                cart_id: cart.id,
                customer_id: cart.customer_id,
                version: cart.version,
            })
            .await;
    }
}

async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
) -> Result<Option<CartModel>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .one(conn)
        .await?)
}

/// A cart line that exists and sits in `customer_id`'s cart; anything else
/// is reported as not found.
async fn find_owned_item<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    item_id: Uuid,
) -> Result<(CartModel, cart_item::Model), ServiceError> {
    let not_found = || ServiceError::NotFound(format!("Cart item {} not found", item_id));

    let cart = find_cart(conn, customer_id).await?.ok_or_else(not_found)?;
    let item = CartItem::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(conn)
        .await?
        .ok_or_else(not_found)?;

    Ok((cart, item))
}

/// Increments the cart's concurrency token.
async fn bump_cart_version<C: ConnectionTrait>(
    conn: &C,
    cart: CartModel,
) -> Result<CartModel, ServiceError> {
    let next = cart.version + 1;
    let mut active: cart::ActiveModel = cart.into();
    active.version = Set(next);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}
