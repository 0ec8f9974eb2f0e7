use crate::{
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel},
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
        payment::{self, Entity as PaymentEntity, Model as PaymentModel},
        OrderStatus, PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::pricing::format_money,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_PER_PAGE: u64 = 100;

/// Highest page served; keeps the row offset within a signed 64-bit value.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PER_PAGE;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Order header as exposed over HTTP; money is rendered with two decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: String,
    pub shipping_cost: String,
    pub tax: String,
    pub total: String,
    pub currency: String,
    pub payment_method: String,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub customer_note: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(order: OrderModel) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            customer_id: order.customer_id,
            status: order.status,
            payment_status: order.payment_status,
            subtotal: format_money(order.subtotal),
            shipping_cost: format_money(order.shipping_cost),
            tax: format_money(order.tax),
            total: format_money(order.total),
            currency: order.currency,
            payment_method: order.payment_method,
            shipping_address_id: order.shipping_address_id,
            billing_address_id: order.billing_address_id,
            customer_note: order.customer_note,
            version: order.version,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<OrderItemModel> for OrderItemResponse {
    fn from(item: OrderItemModel) -> Self {
        Self {
            id: item.id,
            variant_id: item.variant_id,
            product_name: item.product_name,
            variant_name: item.variant_name,
            sku: item.sku,
            quantity: item.quantity,
            unit_price: format_money(item.unit_price),
            line_total: format_money(item.line_total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub amount: String,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentModel> for PaymentResponse {
    fn from(p: PaymentModel) -> Self {
        Self {
            id: p.id,
            amount: format_money(p.amount),
            currency: p.currency,
            status: p.status,
            payment_method: p.payment_method,
            metadata: p.metadata,
            created_at: p.created_at,
        }
    }
}

/// Order with its item snapshots and payment records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    pub payments: Vec<PaymentResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order history for customers and order management for admins.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists the customer's orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        self.list(Some(customer_id), page, per_page).await
    }

    /// Lists every order, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        self.list(None, page, per_page).await
    }

    async fn list(
        &self,
        customer_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.clamp(1, MAX_PAGE);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let mut query = OrderEntity::find();
        if let Some(customer_id) = customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(OrderResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// One of the customer's orders with items and payments. Orders owned by
    /// someone else are reported as not found.
    #[instrument(skip(self))]
    pub async fn get_order_for_customer(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetailResponse, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Sku)
            .all(db)
            .await?;
        let payments = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_asc(payment::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(OrderDetailResponse {
            order: order.into(),
            items: items.into_iter().map(Into::into).collect(),
            payments: payments.into_iter().map(Into::into).collect(),
        })
    }

    /// Moves an order along its lifecycle.
    ///
    /// The write is conditional on the version read in the same transaction,
    /// so two admins racing on one order cannot both succeed.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            warn!(%old_status, %new_status, "rejected order status transition");
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move order from {} to {}",
                old_status, new_status
            )));
        }

        let updated = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status.to_value()))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Version.eq(order.version))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        txn.commit().await?;

        info!(%old_status, %new_status, "order status updated");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        Ok(order.into())
    }

    /// Deletes an order together with its payments and items.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        PaymentEntity::delete_many()
            .filter(payment::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        let deleted = OrderEntity::delete_by_id(order_id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            // Dropping the transaction rolls the child deletes back
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        }
        txn.commit().await?;

        info!(%order_id, "order deleted");
        self.event_sender
            .send_or_log(Event::OrderDeleted { order_id })
            .await;

        Ok(())
    }
}
