//! In-memory [`CartStore`] used by the unit tests. Mirrors the Postgres
//! semantics the job relies on: one active record per identity, set-once
//! promotion links, and age-based sweeps.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cartwatch_core::{CartLine, CartLineAggregate, CoreError, IdentityKey};
use cartwatch_db::{
    AbandonedCartRow, DbError, NewAbandonedCart, NewCartSnapshot, NewPromotionCampaign,
    NewPromotionCode, PromotionCampaignRow, UserRow,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::{CartStore, StoreError};

fn unavailable() -> StoreError {
    StoreError::Db(DbError::Sqlx(sqlx::Error::PoolTimedOut))
}

#[derive(Default)]
struct State {
    lines: BTreeMap<IdentityKey, Vec<CartLine>>,
    undecodable_rows: usize,
    records: Vec<AbandonedCartRow>,
    users: BTreeMap<String, UserRow>,
    purchases: Vec<(Option<String>, String)>,
    campaigns: Vec<PromotionCampaignRow>,
    codes: Vec<(Uuid, NewPromotionCode)>,
    snapshots: Vec<(Uuid, NewCartSnapshot)>,
    fail_stale_query: bool,
    fail_user_lookup: bool,
    fail_create_cart: bool,
    fail_sweeps: bool,
    fail_snapshot_for: Option<Uuid>,
    stale_queries: usize,
}

#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().expect("fake store lock poisoned");
        f(&mut state)
    }

    pub(crate) fn add_line(&self, identity: &IdentityKey, line: CartLine) {
        self.with(|s| s.lines.entry(identity.clone()).or_default().push(line));
    }

    pub(crate) fn add_undecodable_row(&self) {
        self.with(|s| s.undecodable_rows += 1);
    }

    pub(crate) fn add_user(&self, id: &str, email: Option<&str>, first: &str, last: &str) {
        self.with(|s| {
            s.users.insert(
                id.to_string(),
                UserRow {
                    id: id.to_string(),
                    email: email.map(str::to_string),
                    first_name: Some(first.to_string()),
                    last_name: Some(last.to_string()),
                },
            );
        });
    }

    pub(crate) fn add_purchase(&self, user_id: Option<&str>, email: &str) {
        self.with(|s| s.purchases.push((user_id.map(str::to_string), email.to_string())));
    }

    pub(crate) fn add_campaign(&self, coupon_id: &str, active: bool) {
        self.with(|s| {
            s.campaigns.push(PromotionCampaignRow {
                id: Uuid::now_v7(),
                name: cartwatch_core::CAMPAIGN_NAME.to_string(),
                discount_type: cartwatch_core::CAMPAIGN_DISCOUNT_TYPE.to_string(),
                discount_value: cartwatch_core::CAMPAIGN_DISCOUNT_PERCENT,
                stripe_coupon_id: coupon_id.to_string(),
                is_active: active,
                created_at: Utc::now(),
            });
        });
    }

    pub(crate) fn insert_record(&self, row: AbandonedCartRow) {
        self.with(|s| s.records.push(row));
    }

    pub(crate) fn fail_stale_query(&self) {
        self.with(|s| s.fail_stale_query = true);
    }

    pub(crate) fn fail_user_lookup(&self) {
        self.with(|s| s.fail_user_lookup = true);
    }

    pub(crate) fn fail_create_cart(&self) {
        self.with(|s| s.fail_create_cart = true);
    }

    pub(crate) fn fail_sweeps(&self) {
        self.with(|s| s.fail_sweeps = true);
    }

    pub(crate) fn fail_snapshot_for(&self, product_id: Uuid) {
        self.with(|s| s.fail_snapshot_for = Some(product_id));
    }

    pub(crate) fn records(&self) -> Vec<AbandonedCartRow> {
        self.with(|s| s.records.clone())
    }

    pub(crate) fn record_statuses(&self) -> Vec<(String, String)> {
        self.with(|s| {
            s.records
                .iter()
                .map(|r| {
                    let key = r.session_id.clone().or_else(|| r.user_id.clone());
                    (key.unwrap_or_default(), r.status.clone())
                })
                .collect()
        })
    }

    pub(crate) fn codes(&self) -> Vec<(Uuid, NewPromotionCode)> {
        self.with(|s| s.codes.clone())
    }

    pub(crate) fn campaigns(&self) -> Vec<PromotionCampaignRow> {
        self.with(|s| s.campaigns.clone())
    }

    pub(crate) fn snapshots(&self) -> Vec<(Uuid, NewCartSnapshot)> {
        self.with(|s| s.snapshots.clone())
    }

    pub(crate) fn stale_queries(&self) -> usize {
        self.with(|s| s.stale_queries)
    }
}

#[async_trait]
impl CartStore for FakeStore {
    async fn find_stale_cart_aggregates(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Result<CartLineAggregate, StoreError>>, StoreError> {
        self.with(|s| {
            s.stale_queries += 1;
            if s.fail_stale_query {
                return Err(unavailable());
            }
            let mut aggregates: Vec<CartLineAggregate> = s
                .lines
                .iter()
                .filter_map(|(identity, lines)| {
                    CartLineAggregate::from_lines(identity.clone(), lines)
                })
                .filter(|a| a.last_modified < stale_before)
                .collect();
            aggregates.sort_by(|a, b| {
                a.last_modified
                    .cmp(&b.last_modified)
                    .then_with(|| a.identity.cmp(&b.identity))
            });

            let mut rows: Vec<Result<CartLineAggregate, StoreError>> =
                aggregates.into_iter().map(Ok).collect();
            for _ in 0..s.undecodable_rows {
                rows.insert(0, Err(StoreError::Invalid(CoreError::InvalidIdentity)));
            }
            Ok(rows)
        })
    }

    async fn find_abandoned_cart_by_identity(
        &self,
        identity: &IdentityKey,
        active_only: bool,
    ) -> Result<Option<AbandonedCartRow>, StoreError> {
        self.with(|s| {
            Ok(s.records
                .iter()
                .filter(|r| r.session_id.as_deref() == identity.session_id())
                .filter(|r| r.user_id.as_deref() == identity.user_id())
                .filter(|r| !active_only || r.status == "active")
                .max_by_key(|r| r.abandoned_at)
                .cloned())
        })
    }

    async fn create_abandoned_cart(
        &self,
        cart: &NewAbandonedCart,
    ) -> Result<Option<Uuid>, StoreError> {
        self.with(|s| {
            if s.fail_create_cart {
                return Err(unavailable());
            }
            let conflict = s.records.iter().any(|r| {
                r.status == "active"
                    && r.session_id.as_deref() == cart.identity.session_id()
                    && r.user_id.as_deref() == cart.identity.user_id()
            });
            if conflict {
                return Ok(None);
            }
            let id = Uuid::now_v7();
            let now = Utc::now();
            s.records.push(AbandonedCartRow {
                id,
                session_id: cart.identity.session_id().map(str::to_string),
                user_id: cart.identity.user_id().map(str::to_string),
                customer_email: cart.customer_email.clone(),
                customer_name: cart.customer_name.clone(),
                cart_value_cents: cart.cart_value_cents,
                item_count: cart.item_count,
                abandoned_at: cart.abandoned_at,
                status: "active".to_string(),
                promotion_code_id: None,
                created_at: now,
                updated_at: now,
            });
            Ok(Some(id))
        })
    }

    async fn link_promotion_code(
        &self,
        cart_id: Uuid,
        promotion_code_id: Uuid,
    ) -> Result<(), StoreError> {
        self.with(|s| link(s, cart_id, promotion_code_id))
    }

    async fn create_snapshot(
        &self,
        cart_id: Uuid,
        snapshot: &NewCartSnapshot,
    ) -> Result<Uuid, StoreError> {
        self.with(|s| {
            if s.fail_snapshot_for == Some(snapshot.product_id) {
                return Err(unavailable());
            }
            s.snapshots.push((cart_id, snapshot.clone()));
            Ok(Uuid::now_v7())
        })
    }

    async fn list_cart_lines(&self, identity: &IdentityKey) -> Result<Vec<CartLine>, StoreError> {
        self.with(|s| Ok(s.lines.get(identity).cloned().unwrap_or_default()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRow>, StoreError> {
        self.with(|s| {
            if s.fail_user_lookup {
                return Err(unavailable());
            }
            Ok(s.users.get(user_id).cloned())
        })
    }

    async fn has_ever_purchased(
        &self,
        user_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.with(|s| {
            Ok(s.purchases.iter().any(|(uid, mail)| {
                (user_id.is_some() && uid.as_deref() == user_id)
                    || email.is_some_and(|e| e.eq_ignore_ascii_case(mail))
            }))
        })
    }

    async fn list_active_promotion_campaigns(
        &self,
    ) -> Result<Vec<PromotionCampaignRow>, StoreError> {
        self.with(|s| Ok(s.campaigns.iter().filter(|c| c.is_active).cloned().collect()))
    }

    async fn create_promotion_campaign(
        &self,
        campaign: &NewPromotionCampaign,
    ) -> Result<(PromotionCampaignRow, bool), StoreError> {
        self.with(|s| {
            if let Some(existing) = s.campaigns.iter().find(|c| c.name == campaign.name) {
                return Ok((existing.clone(), false));
            }
            let row = PromotionCampaignRow {
                id: Uuid::now_v7(),
                name: campaign.name.clone(),
                discount_type: campaign.discount_type.clone(),
                discount_value: campaign.discount_value,
                stripe_coupon_id: campaign.stripe_coupon_id.clone(),
                is_active: true,
                created_at: Utc::now(),
            };
            s.campaigns.push(row.clone());
            Ok((row, true))
        })
    }

    async fn create_promotion_code(
        &self,
        code: &NewPromotionCode,
        cart_id: Uuid,
    ) -> Result<Uuid, StoreError> {
        self.with(|s| {
            let id = Uuid::now_v7();
            link(s, cart_id, id)?;
            s.codes.push((id, code.clone()));
            Ok(id)
        })
    }

    async fn mark_expired_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.with(|s| {
            if s.fail_sweeps {
                return Err(unavailable());
            }
            let mut changed = 0;
            for record in &mut s.records {
                if record.status == "active" && record.abandoned_at < cutoff {
                    record.status = "expired".to_string();
                    changed += 1;
                }
            }
            Ok(changed)
        })
    }

    async fn delete_old_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.with(|s| {
            if s.fail_sweeps {
                return Err(unavailable());
            }
            let removed: Vec<Uuid> = s
                .records
                .iter()
                .filter(|r| r.abandoned_at < cutoff)
                .map(|r| r.id)
                .collect();
            s.records.retain(|r| !removed.contains(&r.id));
            s.snapshots.retain(|(cart_id, _)| !removed.contains(cart_id));
            Ok(removed.len() as u64)
        })
    }
}

fn link(state: &mut State, cart_id: Uuid, promotion_code_id: Uuid) -> Result<(), StoreError> {
    match state
        .records
        .iter_mut()
        .find(|r| r.id == cart_id && r.promotion_code_id.is_none())
    {
        Some(record) => {
            record.promotion_code_id = Some(promotion_code_id);
            Ok(())
        }
        None => Err(StoreError::Db(DbError::PromotionAlreadyLinked { cart_id })),
    }
}

pub(crate) fn line(name: &str, quantity: i32, unit_price_cents: i64, updated_at: DateTime<Utc>) -> CartLine {
    CartLine {
        product_id: Uuid::now_v7(),
        product_name: name.to_string(),
        variant_name: None,
        sku: Some(format!("SKU-{name}")),
        image_url: None,
        quantity,
        unit_price_cents,
        updated_at,
    }
}

pub(crate) fn abandoned_row(session_id: &str, abandoned_at: DateTime<Utc>, status: &str) -> AbandonedCartRow {
    AbandonedCartRow {
        id: Uuid::now_v7(),
        session_id: Some(session_id.to_string()),
        user_id: None,
        customer_email: None,
        customer_name: None,
        cart_value_cents: 1000,
        item_count: 1,
        abandoned_at,
        status: status.to_string(),
        promotion_code_id: None,
        created_at: abandoned_at,
        updated_at: abandoned_at,
    }
}
