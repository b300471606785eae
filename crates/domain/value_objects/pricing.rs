use serde::Serialize;
use thiserror::Error;

use crate::domain::entities::plans::PlanEntity;

/// Price breakdown in the smallest currency unit.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PricingResult {
    pub base_price: i64,
    pub guest_count: i64,
    pub included_guests: i64,
    pub extra_guests: i64,
    pub guest_unit_price: i64,
    pub extra_guest_price: i64,
    pub total_price: i64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("guest_count must not be negative (got {0})")]
    NegativeGuestCount(i64),
    #[error("price for {0} guests does not fit in the currency range")]
    Overflow(i64),
    #[error("plan {0} has a negative price component")]
    InvalidPlan(String),
}

/// `total = base + unit * max(0, guest_count - included_guests)`, integer arithmetic only.
pub fn calculate_price(plan: &PlanEntity, guest_count: i64) -> Result<PricingResult, PricingError> {
    if guest_count < 0 {
        return Err(PricingError::NegativeGuestCount(guest_count));
    }
    if plan.price_minor < 0 || plan.guest_unit_price_minor < 0 || plan.included_guests < 0 {
        return Err(PricingError::InvalidPlan(plan.slug.clone()));
    }

    let included_guests = i64::from(plan.included_guests);
    let extra_guests = (guest_count - included_guests).max(0);
    let extra_guest_price = extra_guests
        .checked_mul(plan.guest_unit_price_minor)
        .ok_or(PricingError::Overflow(guest_count))?;
    let total_price = plan
        .price_minor
        .checked_add(extra_guest_price)
        .ok_or(PricingError::Overflow(guest_count))?;

    Ok(PricingResult {
        base_price: plan.price_minor,
        guest_count,
        included_guests,
        extra_guests,
        guest_unit_price: plan.guest_unit_price_minor,
        extra_guest_price,
        total_price,
    })
}
