//! Service layer: business logic orchestration.
//!
//! Services hold an `Arc<dyn MarketStore>` for state and an [`EventBus`]
//! for post-commit events. Authorization against the [`Caller`] happens
//! here, before any store access that mutates state.
//!
//! [`EventBus`]: crate::domain::EventBus
//! [`Caller`]: crate::domain::Caller

pub mod cart_service;
pub mod catalog_service;
pub mod gift_card_service;
pub mod order_service;
pub mod payment_service;

pub use cart_service::{CartService, MergeReport};
pub use catalog_service::{ArtworkRecord, CatalogService};
pub use gift_card_service::GiftCardService;
pub use order_service::{OrderQuery, OrderService, PlaceOrder};
pub use payment_service::{CallbackOutcome, GatewaySettings, PaymentService};
