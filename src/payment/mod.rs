//! Payment gateway collaborator utilities.
//!
//! - [`signature`]: HMAC-SHA256 verification of callback bodies.
//! - [`event`]: typed view of the callback payload.
//! - [`money`]: conversion to and from gateway minor units.

pub mod event;
pub mod money;
pub mod signature;

pub use event::{GatewayEvent, GatewayEventKind};
pub use signature::SIGNATURE_HEADER;
