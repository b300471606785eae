use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::{payments::PaymentEntity, subscriptions::SubscriptionEntity};

/// Side effects fired when a payment changes the state of a subscription.
/// Delivery itself (email, SMS, push) lives outside this crate.
#[automock]
#[async_trait]
pub trait PaymentNotifier {
    async fn payment_confirmed(
        &self,
        subscription: SubscriptionEntity,
        payment: PaymentEntity,
    ) -> Result<()>;

    async fn payment_failed(
        &self,
        subscription: SubscriptionEntity,
        payment: PaymentEntity,
    ) -> Result<()>;
}
