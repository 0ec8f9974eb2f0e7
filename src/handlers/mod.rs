pub mod admin;
pub mod cart;
pub mod common;
pub mod health;
pub mod orders;

pub use crate::AppState;
