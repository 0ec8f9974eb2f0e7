use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::success_response,
    services::commerce::{AddToCartInput, CartView, UpdateCartItemInput},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

/// Cart routes, mounted under `/api/v1`
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_cart_item))
        .route(
            "/cart/items/:item_id",
            put(update_cart_item).delete(remove_cart_item),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "Get my cart",
    responses(
        (status = 200, description = "Current cart", body = CartView),
        (status = 401, description = "Unauthorized"),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ServiceError> {
    let cart = state.services.carts.get_cart(user.user_id).await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    summary = "Add item to cart",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<AddToCartInput>,
) -> Result<Response, ServiceError> {
    let cart = state.services.carts.add_item(user.user_id, input).await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    summary = "Change item quantity",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not in cart", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateCartItemInput>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .carts
        .update_item_quantity(user.user_id, item_id, input.quantity)
        .await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    summary = "Remove item from cart",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Item not in cart", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .carts
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(success_response(cart))
}
