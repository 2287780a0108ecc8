//! Domain layer: entities, the order state machine, and the event system.
//!
//! Everything here is pure and synchronous except the [`EventBus`]. Stores
//! call into these types inside their transactions; services publish the
//! resulting [`OrderEvent`]s after commit.

pub mod artwork;
pub mod cart;
pub mod event_bus;
pub mod gift_card;
pub mod identity;
pub mod ids;
pub mod order;
pub mod order_event;

pub use artwork::{Artwork, ItemType, PrintSize};
pub use cart::{CartItem, CartKey, CartLine};
pub use event_bus::EventBus;
pub use gift_card::{GiftCard, GiftCardApplication};
pub use identity::{Caller, Owner, Role};
pub use ids::{ArtworkId, CartItemId, OrderId, UserId};
pub use order::{
    CheckoutRequest, Order, OrderFilter, OrderItem, OrderStatus, OrderTransition, PaymentMethod,
    ShippingInfo, TransitionKind,
};
pub use order_event::OrderEvent;
