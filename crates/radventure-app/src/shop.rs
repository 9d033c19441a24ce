// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{OfferId, ProductId, ProfileId, PurchaseReceipt, RadCoinProduct, SpecialOffer};

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("profile {0} not found -- sign in again and retry")]
    ProfileNotFound(ProfileId),
    #[error("product {0} not found -- refresh the shop and retry")]
    ProductNotFound(ProductId),
    #[error("product {0} is no longer sold")]
    ProductInactive(ProductId),
    #[error("offer {0} is not available right now")]
    OfferUnavailable(OfferId),
    #[error("insufficient RadCoins: balance {balance}, price {price}")]
    InsufficientBalance { balance: i64, price: i64 },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Catalog and purchases for the RadCoin shop.
pub trait ShopService {
    fn list_products(&self) -> Result<Vec<RadCoinProduct>>;

    fn list_offers(&self) -> Result<Vec<SpecialOffer>>;

    fn balance(&self, user: ProfileId) -> Result<i64>;

    fn purchase_product(
        &self,
        user: ProfileId,
        product: ProductId,
    ) -> Result<PurchaseReceipt, PurchaseError>;

    fn purchase_offer(
        &self,
        user: ProfileId,
        offer: OfferId,
    ) -> Result<PurchaseReceipt, PurchaseError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopListing {
    pub product: RadCoinProduct,
    pub offer: Option<SpecialOffer>,
    pub price: i64,
}

/// Active products paired with their cheapest offer available at `now`.
pub fn build_listings(
    products: Vec<RadCoinProduct>,
    offers: &[SpecialOffer],
    now: OffsetDateTime,
) -> Vec<ShopListing> {
    products
        .into_iter()
        .filter(|product| product.is_active)
        .map(|product| {
            let best = offers
                .iter()
                .filter(|offer| offer.product_id == product.id && offer.is_available(now))
                .min_by_key(|offer| offer.effective_price(product.price));
            let price = best.map_or(product.price, |offer| offer.effective_price(product.price));
            ShopListing {
                offer: best.cloned(),
                price,
                product,
            }
        })
        .collect()
}

pub fn load_listings(shop: &dyn ShopService, now: OffsetDateTime) -> Result<Vec<ShopListing>> {
    let offers = shop.list_offers()?;
    Ok(build_listings(shop.list_products()?, &offers, now))
}
