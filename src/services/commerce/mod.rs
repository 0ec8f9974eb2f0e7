/// Commerce services: cart, pricing and checkout
pub mod cart_service;
pub mod checkout_service;
pub mod order_number;
pub mod pricing;

// Re-export services for convenience
pub use cart_service::{AddToCartInput, CartLineView, CartService, CartView, UpdateCartItemInput};
pub use checkout_service::{
    CheckoutCommand, CheckoutError, CheckoutErrorCode, CheckoutPlan, CheckoutService,
    CreateOrderError, CreateOrderRequest, CreateOrderResult, OrderSummary, PaymentMethod,
};
pub use order_number::{OrderNumberGenerator, TimestampOrderNumberGenerator};
pub use pricing::{FlatRateTax, NoTax, OrderTotals, PricingPolicy, ShippingPolicy, TaxCalculator};
