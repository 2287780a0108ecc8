//! Cart service: per-identity cart lines and the guest-to-user merge.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{Artwork, CartItem, CartItemId, CartLine, Caller, Owner};
use crate::error::MarketError;
use crate::persistence::MarketStore;

/// Outcome of folding a guest cart into a user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Guest lines folded into the user's cart.
    pub merged: usize,
    /// Guest lines dropped because their artwork no longer exists.
    pub dropped: usize,
    /// The user's cart after the merge.
    pub cart: Vec<CartItem>,
}

/// Cart operations on top of a [`MarketStore`].
#[derive(Debug, Clone)]
pub struct CartService {
    store: Arc<dyn MarketStore>,
}

impl CartService {
    /// Creates a new `CartService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Lists the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on storage failure.
    pub async fn get(&self, caller: &Caller) -> Result<Vec<CartItem>, MarketError> {
        self.store.cart(&caller.owner).await
    }

    /// Adds a line to the caller's cart, folding it into an existing line
    /// with the same key.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for a malformed line.
    /// - [`MarketError::NotFound`] if the artwork does not exist.
    /// - [`MarketError::OutOfStock`] for an ORIGINAL that is not in stock.
    pub async fn add_item(&self, caller: &Caller, line: CartLine) -> Result<CartItem, MarketError> {
        line.validate()?;
        let artwork = self.require_artwork(&line).await?;
        if !artwork.available_as(line.item_type) {
            return Err(MarketError::OutOfStock(artwork.title));
        }

        let item = self
            .store
            .upsert_cart_line(&caller.owner, &line, Utc::now())
            .await?;
        tracing::debug!(owner = %caller.owner, item_id = %item.id, quantity = item.quantity, "cart line added");
        Ok(item)
    }

    /// Changes the quantity of one of the caller's lines.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the line does not exist.
    /// - [`MarketError::Forbidden`] if it belongs to another identity.
    /// - [`MarketError::Validation`] for an illegal quantity.
    pub async fn update_quantity(
        &self,
        caller: &Caller,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, MarketError> {
        let item = self.owned_item(caller, id).await?;
        item.item_type.validate_line(quantity, item.print_size)?;
        self.store
            .set_cart_quantity(id, quantity, Utc::now())
            .await?
            .ok_or_else(|| MarketError::not_found("cart item", id))
    }

    /// Removes one of the caller's lines.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] or [`MarketError::Forbidden`] as for
    /// [`Self::update_quantity`].
    pub async fn remove_item(&self, caller: &Caller, id: CartItemId) -> Result<(), MarketError> {
        self.owned_item(caller, id).await?;
        if self.store.remove_cart_item(id).await? {
            Ok(())
        } else {
            Err(MarketError::not_found("cart item", id))
        }
    }

    /// Removes every line of the caller's cart. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on storage failure.
    pub async fn clear(&self, caller: &Caller) -> Result<u64, MarketError> {
        let removed = self.store.clear_cart(&caller.owner).await?;
        tracing::debug!(owner = %caller.owner, removed, "cart cleared");
        Ok(removed)
    }

    /// Folds the cart of guest session `guest_session` into the caller's
    /// cart.
    ///
    /// Each guest line is consumed as it is merged, so repeating the call
    /// finds nothing left to fold and leaves quantities unchanged. Lines
    /// whose artwork has disappeared are dropped. Best-effort: a line that
    /// was merged stays merged even if a later line fails.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] if the caller is not an authenticated
    ///   user.
    /// - [`MarketError::Validation`] for a malformed session id.
    pub async fn merge_guest_cart(
        &self,
        caller: &Caller,
        guest_session: &str,
    ) -> Result<MergeReport, MarketError> {
        if caller.owner.is_guest() {
            return Err(MarketError::Forbidden(
                "cart merge requires an authenticated user".to_string(),
            ));
        }
        let guest = Owner::guest(guest_session)?;

        let mut report = MergeReport::default();
        for line in self.store.cart(&guest).await? {
            let artwork = self.store.artwork(line.artwork_id).await?;
            if artwork.is_none() {
                self.store.remove_cart_item(line.id).await?;
                report.dropped += 1;
                continue;
            }
            if self
                .store
                .move_cart_item(line.id, &caller.owner, Utc::now())
                .await?
                .is_some()
            {
                report.merged += 1;
            }
        }

        report.cart = self.store.cart(&caller.owner).await?;
        tracing::info!(
            owner = %caller.owner,
            merged = report.merged,
            dropped = report.dropped,
            "guest cart merged"
        );
        Ok(report)
    }

    async fn require_artwork(&self, line: &CartLine) -> Result<Artwork, MarketError> {
        self.store
            .artwork(line.artwork_id)
            .await?
            .ok_or_else(|| MarketError::not_found("artwork", line.artwork_id))
    }

    async fn owned_item(&self, caller: &Caller, id: CartItemId) -> Result<CartItem, MarketError> {
        let item = self
            .store
            .cart_item(id)
            .await?
            .ok_or_else(|| MarketError::not_found("cart item", id))?;
        if item.owner != caller.owner {
            return Err(MarketError::Forbidden(
                "cart item belongs to another identity".to_string(),
            ));
        }
        Ok(item)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::{ArtworkId, ItemType, PrintSize, Role, UserId};
    use crate::persistence::MemoryStore;

    async fn setup() -> (CartService, Arc<MemoryStore>, Artwork) {
        let store = Arc::new(MemoryStore::new());
        let artwork = Artwork {
            id: ArtworkId::new(),
            title: "Harbour at Dusk".to_string(),
            artist_id: None,
            price: dec!(10000),
            in_stock: true,
            updated_at: Utc::now(),
        };
        assert_ok!(store.put_artwork(&artwork).await);
        let service = CartService::new(Arc::clone(&store) as Arc<dyn MarketStore>);
        (service, store, artwork)
    }

    fn print(id: ArtworkId, quantity: u32) -> CartLine {
        CartLine {
            artwork_id: id,
            quantity,
            item_type: ItemType::Print,
            print_size: Some(PrintSize::A3),
        }
    }

    fn original(id: ArtworkId) -> CartLine {
        CartLine {
            artwork_id: id,
            quantity: 1,
            item_type: ItemType::Original,
            print_size: None,
        }
    }

    #[tokio::test]
    async fn add_sums_matching_lines() {
        let (service, _, art) = setup().await;
        let caller = Caller::user(UserId::new(), Role::Customer);
        assert_ok!(service.add_item(&caller, print(art.id, 2)).await);
        let item = assert_ok!(service.add_item(&caller, print(art.id, 3)).await);
        assert_eq!(item.quantity, 5);
        assert_eq!(assert_ok!(service.get(&caller).await).len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_unknown_and_sold_artworks() {
        let (service, store, art) = setup().await;
        let caller = Caller::user(UserId::new(), Role::Customer);

        let missing = service.add_item(&caller, print(ArtworkId::new(), 1)).await;
        assert!(matches!(missing, Err(MarketError::NotFound { .. })));

        let mut sold = art.clone();
        sold.in_stock = false;
        assert_ok!(store.put_artwork(&sold).await);
        let result = service.add_item(&caller, original(art.id)).await;
        assert!(matches!(result, Err(MarketError::OutOfStock(title)) if title == "Harbour at Dusk"));
        assert_ok!(service.add_item(&caller, print(art.id, 1)).await);
    }

    #[tokio::test]
    async fn update_of_foreign_line_is_forbidden() {
        let (service, _, art) = setup().await;
        let owner = Caller::user(UserId::new(), Role::Customer);
        let other = Caller::user(UserId::new(), Role::Customer);
        let item = assert_ok!(service.add_item(&owner, print(art.id, 1)).await);

        let result = service.update_quantity(&other, item.id, 4).await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));
        assert!(matches!(
            service.remove_item(&other, item.id).await,
            Err(MarketError::Forbidden(_))
        ));

        let updated = assert_ok!(service.update_quantity(&owner, item.id, 4).await);
        assert_eq!(updated.quantity, 4);
        assert_err!(service.update_quantity(&owner, item.id, 0).await);
    }

    #[tokio::test]
    async fn merge_is_idempotent_and_drops_vanished_artworks() {
        let (service, store, art) = setup().await;
        let guest = assert_ok!(Caller::guest("sess-1"));
        let user = Caller::user(UserId::new(), Role::Customer);

        assert_ok!(service.add_item(&guest, print(art.id, 2)).await);
        assert_ok!(service.add_item(&user, print(art.id, 1)).await);

        let first = assert_ok!(service.merge_guest_cart(&user, "sess-1").await);
        assert_eq!(first.merged, 1);
        let second = assert_ok!(service.merge_guest_cart(&user, "sess-1").await);
        assert_eq!(second.merged, 0);
        assert_eq!(first.cart, second.cart);
        let Some(line) = second.cart.first() else {
            panic!("cart should hold the merged line");
        };
        assert_eq!(line.quantity, 3);
        assert!(assert_ok!(service.get(&guest).await).is_empty());

        // A line whose artwork vanished from the catalog is dropped.
        let ghost = CartLine {
            artwork_id: ArtworkId::new(),
            ..print(art.id, 1)
        };
        assert_ok!(store.upsert_cart_line(&guest.owner, &ghost, Utc::now()).await);
        let report = assert_ok!(service.merge_guest_cart(&user, "sess-1").await);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.cart.len(), 1);
    }

    #[tokio::test]
    async fn guests_cannot_merge() {
        let (service, _, _) = setup().await;
        let guest = assert_ok!(Caller::guest("sess-2"));
        let result = service.merge_guest_cart(&guest, "sess-1").await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));
    }
}
