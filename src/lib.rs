//! # gallery-orders
//!
//! Order fulfilment backend for an artwork marketplace.
//!
//! Buyers (signed-in users or anonymous guest sessions) fill a cart, check
//! it out into an order with price snapshots, pay through an external
//! gateway or by bank transfer, and optionally apply a gift card. Operators
//! and artists then move the order through confirmation, shipping and
//! delivery, or cancel it, which releases stock and credits gift cards back.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)          Payment gateway (signed callbacks)
//!     │                        │
//!     ├── REST Handlers + Caller extractor (api/)
//!     │
//!     ├── Cart / Order / Payment / GiftCard / Catalog services (service/)
//!     │        │                     │
//!     │        │                     └── signature + event parsing (payment/)
//!     │        │
//!     │        ├── state machine, materializer, gift card rules (domain/)
//!     │        └── EventBus ──► notification dispatcher (notify/)
//!     │
//!     └── MarketStore (persistence/): in-memory or PostgreSQL
//! ```
//!
//! Every mutating operation is a single [`persistence::MarketStore`] call,
//! and events are published only after that call commits.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod payment;
pub mod persistence;
pub mod service;
