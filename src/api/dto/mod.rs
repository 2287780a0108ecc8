//! Data Transfer Objects for REST request/response serialization.
//!
//! Money amounts are serialized as JSON strings so no precision is lost
//! on the way through JavaScript clients.

pub mod artwork_dto;
pub mod cart_dto;
pub mod common_dto;
pub mod gift_card_dto;
pub mod order_dto;

pub use artwork_dto::*;
pub use cart_dto::*;
pub use common_dto::*;
pub use gift_card_dto::*;
pub use order_dto::*;
