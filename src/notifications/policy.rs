use chrono::{DateTime, Duration, Utc};

use super::{AlertTrigger, SaleAlert};
use crate::models::{Product, ProductState};

/// Percentage drop from `previous` to `current`; `None` when there is no usable baseline.
pub fn discount_percent(previous: f64, current: f64) -> Option<f64> {
    (previous > 0.0).then(|| (previous - current) / previous * 100.0)
}

/// Which rule, if any, the observed price satisfies.
///
/// The target price wins over the discount rule when both apply.
pub fn alert_trigger(product: &Product, current: f64, previous: Option<f64>) -> Option<AlertTrigger> {
    if let Some(target) = product.target_price
        && current <= target
    {
        return Some(AlertTrigger::TargetPrice);
    }

    let threshold = product.discount_threshold?;
    let drop = discount_percent(previous?, current)?;
    (drop >= threshold).then_some(AlertTrigger::Discount)
}

/// Whether a new alert may go out given the last one recorded in `state`.
///
/// Inside the cooldown window only a strictly lower price than the last
/// notified one gets through.
pub fn cooldown_allows(product: &Product, current: f64, state: &ProductState, now: DateTime<Utc>) -> bool {
    let Some(sent_at) = state.last_notification_sent else {
        return true;
    };

    let cooldown = Duration::hours(i64::from(product.notification_cooldown_hours));
    if now - sent_at >= cooldown {
        return true;
    }

    match state.last_notification_price {
        Some(notified) => current < notified,
        None => true,
    }
}

/// Decide whether to alert for a fresh observation. `previous` is the price
/// before this check.
pub fn evaluate_alert(
    product: &Product,
    current: f64,
    previous: Option<f64>,
    state: &ProductState,
    now: DateTime<Utc>,
) -> Option<SaleAlert> {
    let trigger = alert_trigger(product, current, previous)?;

    if !cooldown_allows(product, current, state, now) {
        tracing::debug!("{}: alert suppressed by cooldown", product.name);
        return None;
    }

    Some(SaleAlert {
        product_name: product.name.clone(),
        url: product.url.clone(),
        current_price: current,
        previous_price: previous,
        target_price: product.target_price,
        trigger,
    })
}
