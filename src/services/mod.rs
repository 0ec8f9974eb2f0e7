pub mod commerce;
pub mod orders;

pub use commerce::{CartService, CheckoutService};
pub use orders::OrderService;
