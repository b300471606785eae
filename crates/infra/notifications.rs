use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::{
    domain::{
        entities::{payments::PaymentEntity, subscriptions::SubscriptionEntity},
        repositories::payment_notifications::PaymentNotifier,
    },
    observability::redact::mask_phone_number,
};

/// Emits payment notifications as structured log events. Delivery channels
/// (email, SMS, push) subscribe to these downstream.
#[derive(Debug, Default, Clone)]
pub struct TracingPaymentNotifier;

impl TracingPaymentNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentNotifier for TracingPaymentNotifier {
    async fn payment_confirmed(
        &self,
        subscription: SubscriptionEntity,
        payment: PaymentEntity,
    ) -> Result<()> {
        info!(
            target: "billing_notifications",
            owner_id = %subscription.owner_id,
            subscription_id = %subscription.id,
            payment_id = %payment.id,
            plan_type = %subscription.plan_type,
            amount_minor = payment.amount_minor,
            currency = %payment.currency,
            payment_method = %payment.payment_method,
            phone_number = %mask_phone_number(&payment.phone_number),
            expires_at = ?subscription.expires_at,
            "notifications: payment confirmed"
        );
        Ok(())
    }

    async fn payment_failed(
        &self,
        subscription: SubscriptionEntity,
        payment: PaymentEntity,
    ) -> Result<()> {
        info!(
            target: "billing_notifications",
            owner_id = %subscription.owner_id,
            subscription_id = %subscription.id,
            payment_id = %payment.id,
            amount_minor = payment.amount_minor,
            payment_method = %payment.payment_method,
            phone_number = %mask_phone_number(&payment.phone_number),
            failure_reason = ?payment.metadata.get("failure_reason"),
            "notifications: payment failed"
        );
        Ok(())
    }
}
