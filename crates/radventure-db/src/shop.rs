// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use radventure_app::{
    OfferId, ProductId, ProfileId, PurchaseError, PurchaseReceipt, RadCoinProduct, ShopService,
    SpecialOffer, TxType,
};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    OFFER_COLUMNS, PRODUCT_COLUMNS, Store, append_transaction, current_balance, now_rfc3339,
    offer_from_row, product_from_row,
};

impl Store {
    pub fn purchase_product(
        &self,
        user_id: ProfileId,
        product_id: ProductId,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        self.purchase(user_id, product_id, None)
    }

    pub fn purchase_offer(
        &self,
        user_id: ProfileId,
        offer_id: OfferId,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let offer = self
            .get_offer(offer_id)?
            .ok_or(PurchaseError::OfferUnavailable(offer_id))?;
        self.purchase(user_id, offer.product_id, Some(offer_id))
    }

    /// Debit, benefit grant and ledger entry commit together or not at all.
    fn purchase(
        &self,
        user_id: ProfileId,
        product_id: ProductId,
        offer_id: Option<OfferId>,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin purchase")?;

        let product = load_product(&tx, product_id)?.ok_or(PurchaseError::ProductNotFound(product_id))?;
        if !product.is_active {
            return Err(PurchaseError::ProductInactive(product_id));
        }

        let price = match offer_id {
            None => product.price,
            Some(offer_id) => {
                let offer = load_offer(&tx, offer_id)?
                    .filter(|offer| offer.product_id == product_id)
                    .filter(|offer| offer.is_available(OffsetDateTime::now_utc()))
                    .ok_or(PurchaseError::OfferUnavailable(offer_id))?;
                offer.effective_price(product.price)
            }
        };

        let now = now_rfc3339()?;
        let debited = tx
            .execute(
                "
                UPDATE profiles
                SET radcoin_balance = radcoin_balance - ?1, updated_at = ?2
                WHERE id = ?3 AND radcoin_balance >= ?1
                ",
                params![price, now, user_id.get()],
            )
            .context("debit balance")?;
        if debited == 0 {
            return Err(match current_balance(&tx, user_id)? {
                None => PurchaseError::ProfileNotFound(user_id),
                Some(balance) => {
                    warn!(user = %user_id, product = %product_id, balance, price, "purchase declined");
                    PurchaseError::InsufficientBalance { balance, price }
                }
            });
        }

        let benefits = product.benefits;
        tx.execute(
            "
            INSERT INTO user_benefits (
              user_id, elimination_aids, skip_aids, ai_tutor_credits, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
              elimination_aids = elimination_aids + excluded.elimination_aids,
              skip_aids = skip_aids + excluded.skip_aids,
              ai_tutor_credits = ai_tutor_credits + excluded.ai_tutor_credits,
              updated_at = excluded.updated_at
            ",
            params![
                user_id.get(),
                benefits.elimination_aids,
                benefits.skip_aids,
                benefits.ai_tutor_credits,
                now,
            ],
        )
        .context("grant benefits")?;

        let balance_after = current_balance(&tx, user_id)?.ok_or(PurchaseError::ProfileNotFound(user_id))?;
        let transaction_id = append_transaction(
            &tx,
            user_id,
            TxType::Purchase,
            -price,
            balance_after,
            &json!({
                "product_id": product_id,
                "product_name": product.name,
                "offer_id": offer_id,
                "benefits": benefits,
            }),
            &now,
        )?;
        tx.commit().context("commit purchase")?;

        info!(
            user = %user_id,
            product = %product_id,
            price,
            balance_after,
            "purchase completed"
        );
        Ok(PurchaseReceipt {
            transaction_id,
            product_id,
            offer_id,
            price_paid: price,
            balance_after,
            benefits_granted: benefits,
        })
    }
}

impl ShopService for Store {
    fn list_products(&self) -> Result<Vec<RadCoinProduct>> {
        Store::list_products(self, false)
    }

    fn list_offers(&self) -> Result<Vec<SpecialOffer>> {
        Store::list_offers(self)
    }

    fn balance(&self, user: ProfileId) -> Result<i64> {
        Ok(self.get_profile(user)?.radcoin_balance)
    }

    fn purchase_product(
        &self,
        user: ProfileId,
        product: ProductId,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        Store::purchase_product(self, user, product)
    }

    fn purchase_offer(
        &self,
        user: ProfileId,
        offer: OfferId,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        Store::purchase_offer(self, user, offer)
    }
}

fn load_product(conn: &Connection, product_id: ProductId) -> Result<Option<RadCoinProduct>> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM radcoin_products WHERE id = ?"),
        params![product_id.get()],
        product_from_row,
    )
    .optional()
    .with_context(|| format!("load product {product_id}"))
}

fn load_offer(conn: &Connection, offer_id: OfferId) -> Result<Option<SpecialOffer>> {
    conn.query_row(
        &format!("SELECT {OFFER_COLUMNS} FROM special_offers WHERE id = ?"),
        params![offer_id.get()],
        offer_from_row,
    )
    .optional()
    .with_context(|| format!("load offer {offer_id}"))
}
