use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Orders API",
        version = "0.1.0",
        description = r#"
# Storefront Orders API

Converts a customer's cart into an immutable, fully priced order.

## Authentication

Customer and admin endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Admin endpoints additionally require the `admin` role.

## Checkout results

`POST /api/v1/orders` always answers with a `CreateOrderResult`. On failure
`error.code` is one of `UNAUTHORIZED`, `VALIDATION_ERROR`, `EMPTY_CART`,
`INVALID_ADDRESS`, `CART_MODIFIED` or `PERSISTENCE_FAILURE`.

## Money

Amounts are exact decimals rendered as strings with two places, e.g. `"105.00"`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Checkout and order history"),
        (name = "cart", description = "Shopping cart"),
        (name = "admin", description = "Back-office order management"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_my_order,
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_cart_item,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::admin::list_orders,
        crate::handlers::admin::update_order_status,
        crate::handlers::admin::delete_order,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::services::commerce::CreateOrderRequest,
            crate::services::commerce::CreateOrderResult,
            crate::services::commerce::CreateOrderError,
            crate::services::commerce::CheckoutErrorCode,
            crate::services::commerce::OrderSummary,
            crate::services::commerce::AddToCartInput,
            crate::services::commerce::UpdateCartItemInput,
            crate::services::commerce::CartView,
            crate::services::commerce::CartLineView,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::PaymentResponse,
            crate::services::orders::OrderDetailResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::entities::OrderStatus,
            crate::entities::PaymentStatus,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentStatus,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
