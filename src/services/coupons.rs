use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{coupon, Coupon, CouponModel, DiscountType},
    errors::ServiceError,
};

/// Coupon evaluation and redemption.
///
/// Evaluation is read-only; redemption increments `used_count` exactly once
/// per settlement, under a row lock, inside the settlement transaction.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates a code against a subtotal and computes the discount.
    ///
    /// Check order (first failure wins): existence/activity, validity window,
    /// usage limit, minimum purchase. An unknown code and an out-of-window
    /// code are deliberately indistinguishable to the caller.
    #[instrument(skip(self))]
    pub async fn evaluate(
        &self,
        code: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DiscountResult, ServiceError> {
        evaluate_on(&*self.db, code, subtotal, now).await
    }

    /// Increments the coupon's usage counter. Locks the row and re-checks
    /// the limit so concurrent settlements cannot push `used_count` past
    /// `usage_limit`.
    pub async fn redeem(
        &self,
        conn: &impl ConnectionTrait,
        coupon_id: Uuid,
    ) -> Result<(), ServiceError> {
        let coupon = Coupon::find_by_id(coupon_id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or(ServiceError::InvalidCoupon)?;

        if let Some(limit) = coupon.usage_limit {
            if coupon.used_count >= limit {
                warn!("coupon {} hit usage limit during redemption", coupon.code);
                return Err(ServiceError::CouponUsageLimitReached);
            }
        }

        let used = coupon.used_count;
        let mut active: coupon::ActiveModel = coupon.into();
        active.used_count = Set(used + 1);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;

        Ok(())
    }
}

/// Connection-generic evaluation, callable inside the settlement transaction.
pub async fn evaluate_on(
    conn: &impl ConnectionTrait,
    code: &str,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<DiscountResult, ServiceError> {
    let coupon = Coupon::find()
        .filter(coupon::Column::Code.eq(code))
        .filter(coupon::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or(ServiceError::InvalidCoupon)?;

    if now < coupon.valid_from || now > coupon.valid_to {
        debug!("coupon {} outside validity window", coupon.code);
        return Err(ServiceError::InvalidCoupon);
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(ServiceError::CouponUsageLimitReached);
        }
    }

    if subtotal < coupon.min_purchase {
        return Err(ServiceError::CouponBelowMinimumPurchase {
            min_purchase: coupon.min_purchase,
        });
    }

    let discount = compute_discount(&coupon, subtotal);

    Ok(DiscountResult {
        coupon_id: coupon.id,
        code: coupon.code,
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        discount,
    })
}

/// Discount math.
///
/// Percentage coupons are clamped to `max_discount` when set. Fixed coupons
/// apply their value verbatim, even past the subtotal.
pub fn compute_discount(coupon: &CouponModel, subtotal: Decimal) -> Decimal {
    match coupon.discount_type {
        DiscountType::Percentage => {
            let discount = subtotal * coupon.discount_value / Decimal::from(100);
            match coupon.max_discount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    }
}

/// Outcome of a successful coupon evaluation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DiscountResult {
    pub coupon_id: Uuid,
    pub code: String,
    #[schema(value_type = String)]
    pub discount_type: DiscountType,
    #[schema(value_type = String)]
    pub discount_value: Decimal,
    /// Discount amount for the evaluated subtotal.
    #[schema(value_type = String)]
    pub discount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal, max: Option<Decimal>) -> CouponModel {
        let now = Utc::now();
        CouponModel {
            id: Uuid::new_v4(),
            code: "SAVE".to_string(),
            discount_type,
            discount_value: value,
            usage_limit: None,
            used_count: 0,
            valid_from: now,
            valid_to: now,
            min_purchase: Decimal::ZERO,
            max_discount: max,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_discount_on_subtotal() {
        let c = coupon(DiscountType::Percentage, dec!(20), None);
        assert_eq!(compute_discount(&c, dec!(100.00)), dec!(20.00));
    }

    #[test]
    fn percentage_discount_clamped_to_max() {
        let c = coupon(DiscountType::Percentage, dec!(20), Some(dec!(15.00)));
        assert_eq!(compute_discount(&c, dec!(100.00)), dec!(15.00));
    }

    #[test]
    fn percentage_below_cap_is_untouched() {
        let c = coupon(DiscountType::Percentage, dec!(10), Some(dec!(15.00)));
        assert_eq!(compute_discount(&c, dec!(100.00)), dec!(10.00));
    }

    #[test]
    fn fixed_discount_is_verbatim() {
        let c = coupon(DiscountType::Fixed, dec!(5.00), None);
        assert_eq!(compute_discount(&c, dec!(100.00)), dec!(5.00));
    }

    #[test]
    fn fixed_discount_may_exceed_subtotal() {
        // Pass-through of observed behavior: no clamping on fixed coupons.
        let c = coupon(DiscountType::Fixed, dec!(150.00), None);
        assert_eq!(compute_discount(&c, dec!(100.00)), dec!(150.00));
    }

    #[test]
    fn max_discount_ignored_for_fixed() {
        let c = coupon(DiscountType::Fixed, dec!(50.00), Some(dec!(10.00)));
        assert_eq!(compute_discount(&c, dec!(100.00)), dec!(50.00));
    }
}
