use crate::{
    auth::admin_middleware,
    errors::ServiceError,
    handlers::common::{no_content_response, success_response, PaginationParams},
    services::orders::{OrderListResponse, OrderResponse, UpdateOrderStatusRequest},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

/// Back-office order management, mounted under `/api/v1/admin`.
/// Every route requires the `admin` role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id/status", put(update_order_status))
        .route("/orders/:id", axum::routing::delete(delete_order))
        .route_layer(middleware::from_fn(admin_middleware))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    summary = "List all orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders(params.page, params.per_page)
        .await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    summary = "Change order status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(order_id, request.status)
        .await?;
    Ok(success_response(order))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/orders/{id}",
    summary = "Delete order",
    description = "Delete an order together with its items and payments",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.orders.delete_order(order_id).await?;
    Ok(no_content_response())
}
