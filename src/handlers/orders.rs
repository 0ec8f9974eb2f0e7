use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{success_response, PaginationParams},
    services::{
        commerce::{CheckoutError, CreateOrderRequest, CreateOrderResult},
        orders::{OrderDetailResponse, OrderListResponse},
    },
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use tracing::warn;
use uuid::Uuid;

/// Customer order routes, mounted under `/api/v1`
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_my_orders).post(create_order))
        .route("/orders/:id", get(get_my_order))
}

/// Create an order from the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Convert the authenticated customer's cart into an order, clearing the cart in the same transaction",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = CreateOrderResult),
        (status = 400, description = "VALIDATION_ERROR", body = CreateOrderResult),
        (status = 401, description = "UNAUTHORIZED", body = CreateOrderResult),
        (status = 409, description = "CART_MODIFIED", body = CreateOrderResult),
        (status = 422, description = "EMPTY_CART or INVALID_ADDRESS", body = CreateOrderResult),
        (status = 500, description = "PERSISTENCE_FAILURE", body = CreateOrderResult),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Response {
    let customer_id = user.map(|Extension(user)| user.user_id);

    let result = match (customer_id, payload) {
        (Some(_), Err(rejection)) => {
            let err = CheckoutError::Validation(rejection.body_text());
            warn!(error = %err, "order request rejected");
            CreateOrderResult::failed(&err)
        }
        (customer_id, Ok(Json(request))) => {
            state.services.checkout.create_order(customer_id, request).await
        }
        (None, Err(_)) => CreateOrderResult::failed(&CheckoutError::Unauthorized),
    };

    (result.status_code(), Json(result)).into_response()
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List my orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders_for_customer(user.user_id, params.page, params.per_page)
        .await?;

    Ok(success_response(orders))
}

/// Get one of the caller's orders with items and payments
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get my order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved", body = OrderDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_my_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_customer(user.user_id, order_id)
        .await?;

    Ok(success_response(order))
}
