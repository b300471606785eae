use chrono::Utc;
use crates::{
    domain::{
        entities::{
            payments::{InsertPaymentEntity, PaymentEntity, metadata_patch},
            subscriptions::SubscriptionEntity,
        },
        repositories::{
            payment_notifications::PaymentNotifier, payments::PaymentRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            enums::{
                payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
                subscription_statuses::SubscriptionStatus,
            },
            payments::{ProviderStatus, ProviderStatusReport, ReconcileOutcome},
            phone_numbers::{classify_provider, normalize_phone_number},
        },
    },
    observability::redact::mask_phone_number,
    payments::gateway::{GatewayError, PaymentGateways, SharedGateway, TransferRequest},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{BillingError, BillingResult},
    subscriptions::expiry_after_payment,
};

/// Subscription writes inside reconcile are retried this many times after a lost race.
const RECONCILE_WRITE_ATTEMPTS: usize = 3;
const MAX_EXTERNAL_REFERENCE_LEN: usize = 128;
/// Payment metadata key set once the amount has been credited to the subscription.
const APPLIED_MARKER: &str = "applied_at";

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub payment: PaymentEntity,
    pub reference: Option<String>,
    /// True when an earlier request with the same external reference is returned.
    pub replayed: bool,
}

#[derive(Debug, Clone)]
pub struct PaymentStatusInfo {
    pub payment: PaymentEntity,
    pub subscription_status: SubscriptionStatus,
    pub provider_status: Option<ProviderStatus>,
    pub outcome: Option<ReconcileOutcome>,
}

pub struct PaymentUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
    gateways: PaymentGateways,
    notifier: Arc<dyn PaymentNotifier + Send + Sync>,
    currency: String,
}

impl PaymentUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
        gateways: PaymentGateways,
        notifier: Arc<dyn PaymentNotifier + Send + Sync>,
        currency: String,
    ) -> Self {
        Self {
            subscription_repo,
            payment_repo,
            gateways,
            notifier,
            currency,
        }
    }

    pub async fn initiate_payment(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
        raw_phone: &str,
        external_reference: &str,
    ) -> BillingResult<InitiatedPayment> {
        let external_reference = external_reference.trim();
        if external_reference.is_empty() || external_reference.len() > MAX_EXTERNAL_REFERENCE_LEN {
            return Err(BillingError::InvalidInput(format!(
                "external_reference must be 1 to {MAX_EXTERNAL_REFERENCE_LEN} characters"
            )));
        }

        let phone = normalize_phone_number(raw_phone)
            .map_err(|err| BillingError::InvalidInput(err.to_string()))?;
        let method = classify_provider(&phone).ok_or_else(|| {
            BillingError::UnsupportedProvider(format!(
                "no mobile money operator for number {}",
                mask_phone_number(phone.national())
            ))
        })?;
        let gateway = self.gateway_for(method)?;

        let subscription = self.owned_subscription(owner_id, subscription_id).await?;

        if let Some(existing) = self
            .find_by_external_reference(subscription.id, external_reference)
            .await?
        {
            info!(
                %owner_id,
                %subscription_id,
                payment_id = %existing.id,
                "payments: replaying initiation for known external reference"
            );
            return Ok(InitiatedPayment {
                reference: existing.transaction_reference.clone(),
                payment: existing,
                replayed: true,
            });
        }

        let outstanding = subscription.outstanding_minor();
        let status = subscription.payment_status;
        let subscription = match status {
            SubscriptionStatus::Pending | SubscriptionStatus::Failed if outstanding <= 0 => {
                return Err(BillingError::InvalidStateTransition(
                    "subscription has no outstanding balance".to_string(),
                ));
            }
            SubscriptionStatus::Pending => subscription,
            SubscriptionStatus::Failed => self.reopen_failed_subscription(subscription).await?,
            status => {
                return Err(BillingError::InvalidStateTransition(format!(
                    "cannot start a payment for a {status} subscription"
                )));
            }
        };

        // The operator reference is stored with the row so the payment can be polled
        // and matched to callbacks even if nothing else is written after the transfer.
        let transaction_reference = gateway.reserve_reference().await.map_err(|err| {
            warn!(
                %owner_id,
                %subscription_id,
                payment_method = %method,
                gateway_error = %err,
                "payments: could not reserve transaction reference"
            );
            provider_error(err)
        })?;

        let insert = InsertPaymentEntity {
            subscription_id: subscription.id,
            owner_id,
            amount_minor: outstanding,
            currency: self.currency.clone(),
            payment_method: method.to_string(),
            phone_number: phone.international(),
            external_reference: external_reference.to_string(),
            transaction_reference: Some(transaction_reference.clone()),
            status: PaymentStatus::Pending.to_string(),
            metadata: json!({ "initiated_at": Utc::now().to_rfc3339() }),
        };
        let payment = match self.payment_repo.insert(insert).await {
            Ok(payment) => payment,
            Err(err) => {
                // A concurrent request with the same key may have won the unique index.
                if let Some(existing) = self
                    .find_by_external_reference(subscription.id, external_reference)
                    .await?
                {
                    return Ok(InitiatedPayment {
                        reference: existing.transaction_reference.clone(),
                        payment: existing,
                        replayed: true,
                    });
                }
                error!(%owner_id, %subscription_id, db_error = ?err, "payments: failed to insert payment");
                return Err(BillingError::Internal(err));
            }
        };

        info!(
            %owner_id,
            %subscription_id,
            payment_id = %payment.id,
            payment_method = %method,
            amount_minor = payment.amount_minor,
            phone_number = %mask_phone_number(&payment.phone_number),
            "payments: payment created, requesting transfer"
        );

        let request = TransferRequest {
            payment_id: payment.id,
            transaction_reference,
            external_reference: payment.external_reference.clone(),
            amount_minor: payment.amount_minor,
            currency: payment.currency.clone(),
            phone_number: payment.phone_number.clone(),
            description: format!("{} subscription", subscription.plan_type),
        };

        match gateway.request_transfer(request).await {
            Ok(accepted) => {
                if payment.transaction_reference.as_deref()
                    != Some(accepted.transaction_reference.as_str())
                {
                    warn!(
                        payment_id = %payment.id,
                        reserved = ?payment.transaction_reference,
                        returned = %accepted.transaction_reference,
                        "payments: operator returned a different transaction reference"
                    );
                }

                // The payment is already reconcilable; the transfer response is informational.
                let metadata = metadata_patch([
                    ("transfer_response", accepted.raw),
                    ("transfer_reference", json!(accepted.transaction_reference)),
                ]);
                let payment = match self.payment_repo.update_metadata(payment.id, metadata).await {
                    Ok(updated) => updated,
                    Err(err) => {
                        warn!(payment_id = %payment.id, db_error = ?err, "payments: failed to store transfer response");
                        payment
                    }
                };

                Ok(InitiatedPayment {
                    reference: payment.transaction_reference.clone(),
                    payment,
                    replayed: false,
                })
            }
            Err(err) => {
                warn!(
                    payment_id = %payment.id,
                    payment_method = %method,
                    gateway_error = %err,
                    "payments: transfer request failed"
                );
                let raw = err.raw_payload();
                let metadata = metadata_patch([
                    ("failure_reason", json!(err.to_string())),
                    ("provider_payload", raw.clone()),
                    ("failed_at", json!(Utc::now().to_rfc3339())),
                ]);
                self.transition(&payment, PaymentStatus::Pending, PaymentStatus::Failed, metadata)
                    .await?;

                Err(BillingError::ProviderError {
                    message: err.to_string(),
                    raw,
                })
            }
        }
    }

    /// A failed payment stays failed; retry opens a fresh attempt for the current balance.
    pub async fn retry_payment(
        &self,
        owner_id: Uuid,
        payment_id: Uuid,
        raw_phone: &str,
        external_reference: Option<String>,
    ) -> BillingResult<InitiatedPayment> {
        let payment = self.owned_payment(owner_id, payment_id).await?;
        if payment.status != PaymentStatus::Failed {
            return Err(BillingError::NotRetryable(payment.status));
        }

        let external_reference = external_reference
            .map(|reference| reference.trim().to_string())
            .filter(|reference| !reference.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        info!(%owner_id, failed_payment_id = %payment.id, "payments: retrying failed payment");
        self.initiate_payment(owner_id, payment.subscription_id, raw_phone, &external_reference)
            .await
    }

    pub async fn poll_payment_status(
        &self,
        owner_id: Uuid,
        payment_id: Uuid,
    ) -> BillingResult<PaymentStatusInfo> {
        let payment = self.owned_payment(owner_id, payment_id).await?;

        let transaction_reference = match (&payment.status, &payment.transaction_reference) {
            (PaymentStatus::Pending, Some(reference)) => reference.clone(),
            _ => return self.status_info(payment, None, None).await,
        };

        let gateway = self.gateway_for(payment.payment_method)?;
        let report = gateway
            .query_status(transaction_reference)
            .await
            .map_err(|err| {
                warn!(%payment_id, gateway_error = %err, "payments: status query failed");
                provider_error(err)
            })?;

        let provider_status = report.status.clone();
        let outcome = self.reconcile(payment, report).await?;
        let payment = self.load_payment(payment_id).await?;
        self.status_info(payment, Some(provider_status), Some(outcome))
            .await
    }

    /// Signature is checked by the gateway before the payload is trusted.
    pub async fn handle_provider_callback(
        &self,
        provider: &str,
        raw_payload: &[u8],
        signature: Option<String>,
    ) -> BillingResult<ReconcileOutcome> {
        let method = PaymentMethod::from_str(provider)
            .ok_or_else(|| BillingError::UnsupportedProvider(provider.to_string()))?;
        let gateway = self.gateway_for(method)?;

        let callback = gateway.parse_callback(raw_payload, signature).map_err(|err| {
            warn!(payment_method = %method, gateway_error = %err, "payments: callback rejected");
            BillingError::from(err)
        })?;

        let payment = self
            .payment_repo
            .find_by_transaction_reference(method, callback.reference.clone())
            .await
            .map_err(|err| {
                error!(payment_method = %method, db_error = ?err, "payments: failed to load payment for callback");
                BillingError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(
                    payment_method = %method,
                    reference = %callback.reference,
                    "payments: callback for unknown transaction"
                );
                BillingError::PaymentNotFound
            })?;

        self.reconcile(payment, callback.report).await
    }

    /// Applies a provider outcome. Safe to run any number of times for the same
    /// payment and status.
    pub async fn reconcile(
        &self,
        payment: PaymentEntity,
        report: ProviderStatusReport,
    ) -> BillingResult<ReconcileOutcome> {
        match report.status {
            ProviderStatus::Pending => Ok(ReconcileOutcome::StillPending),
            ProviderStatus::Successful => self.apply_success(payment, report.raw).await,
            ProviderStatus::Failed { reason } => {
                self.apply_failure(payment, reason, report.raw).await
            }
            ProviderStatus::Unknown { raw_status } => {
                warn!(
                    payment_id = %payment.id,
                    raw_status = %raw_status,
                    "payments: unrecognized provider status"
                );
                let metadata = metadata_patch([
                    ("unreconciled_provider_payload", report.raw.clone()),
                    ("unreconciled_at", json!(Utc::now().to_rfc3339())),
                ]);
                self.payment_repo
                    .update_metadata(payment.id, metadata)
                    .await
                    .map_err(|err| {
                        error!(payment_id = %payment.id, db_error = ?err, "payments: failed to store unreconciled payload");
                        BillingError::Internal(err)
                    })?;

                Err(BillingError::ProviderError {
                    message: format!("unrecognized provider status {raw_status:?}"),
                    raw: report.raw,
                })
            }
        }
    }

    /// Bookkeeping only: the money movement back to the payer happens outside the engine.
    pub async fn refund_payment(
        &self,
        admin_id: Uuid,
        payment_id: Uuid,
        reason: Option<String>,
    ) -> BillingResult<PaymentEntity> {
        let payment = self.load_payment(payment_id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(BillingError::NotRefundable(payment.status));
        }

        let metadata = metadata_patch([
            ("refund_reason", json!(reason)),
            ("refunded_at", json!(Utc::now().to_rfc3339())),
            ("refunded_by", json!(admin_id)),
        ]);
        let Some(refunded) = self
            .transition(&payment, PaymentStatus::Completed, PaymentStatus::Refunded, metadata)
            .await?
        else {
            let current = self.load_payment(payment_id).await?;
            return Err(BillingError::NotRefundable(current.status));
        };

        for _ in 0..RECONCILE_WRITE_ATTEMPTS {
            let subscription = self.load_subscription(refunded.subscription_id).await?;
            if subscription.paid_by_payment_id != Some(refunded.id)
                || !subscription
                    .payment_status
                    .can_transition_to(SubscriptionStatus::Refunded)
            {
                info!(
                    %payment_id,
                    subscription_id = %subscription.id,
                    subscription_status = %subscription.payment_status,
                    "payments: refund leaves subscription unchanged"
                );
                return Ok(refunded);
            }

            let mut updated = subscription;
            updated.payment_status = SubscriptionStatus::Refunded;
            updated.expires_at = Some(Utc::now());
            if self.update_subscription(updated).await?.is_some() {
                info!(%admin_id, %payment_id, "payments: payment refunded");
                return Ok(refunded);
            }
        }

        error!(%payment_id, "payments: refunded payment but could not update subscription");
        Err(BillingError::StaleWrite)
    }

    pub async fn list_payments(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
    ) -> BillingResult<Vec<PaymentEntity>> {
        let subscription = self.owned_subscription(owner_id, subscription_id).await?;
        self.payment_repo
            .list_by_subscription(subscription.id)
            .await
            .map_err(|err| {
                error!(%owner_id, %subscription_id, db_error = ?err, "payments: failed to list payments");
                BillingError::Internal(err)
            })
    }

    async fn apply_success(
        &self,
        payment: PaymentEntity,
        raw: Value,
    ) -> BillingResult<ReconcileOutcome> {
        let metadata = metadata_patch([
            ("provider_payload", raw),
            ("completed_at", json!(Utc::now().to_rfc3339())),
        ]);

        let completed = match self
            .transition(&payment, PaymentStatus::Pending, PaymentStatus::Completed, metadata)
            .await?
        {
            Some(completed) => {
                info!(payment_id = %completed.id, "payments: payment completed");
                completed
            }
            None => {
                let current = self.load_payment(payment.id).await?;
                match current.status {
                    // Already completed: make sure the subscription caught up.
                    PaymentStatus::Completed => current,
                    status => {
                        warn!(
                            payment_id = %current.id,
                            payment_status = %status,
                            "payments: success reported for a payment in a terminal state"
                        );
                        return Ok(ReconcileOutcome::Ignored);
                    }
                }
            }
        };

        self.settle_subscription(completed).await
    }

    /// Credits a completed payment to its subscription. The subscription only
    /// becomes paid once the credited amount covers the current total; an upgrade
    /// made while the payment was in flight leaves the rest outstanding.
    async fn settle_subscription(&self, payment: PaymentEntity) -> BillingResult<ReconcileOutcome> {
        if payment.metadata.contains_key(APPLIED_MARKER) {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        for attempt in 1..=RECONCILE_WRITE_ATTEMPTS {
            let subscription = self.load_subscription(payment.subscription_id).await?;

            if subscription.paid_by_payment_id == Some(payment.id) {
                return Ok(ReconcileOutcome::AlreadyApplied);
            }

            if subscription.payment_status == SubscriptionStatus::Paid
                || subscription.payment_status.is_closed()
            {
                return self.mark_superseded(payment, &subscription).await;
            }

            let amount_paid = subscription
                .amount_paid_minor
                .saturating_add(payment.amount_minor);
            let covered = amount_paid >= subscription.total_price_minor;

            let mut updated = subscription.clone();
            updated.amount_paid_minor = amount_paid;
            updated.paid_by_payment_id = Some(payment.id);
            updated.payment_method = Some(payment.payment_method);
            updated.payment_reference = payment.transaction_reference.clone();
            if covered {
                let previous = match subscription.renewal_of {
                    Some(previous_id) => self.find_subscription(previous_id).await?,
                    None => None,
                };
                updated.payment_status = SubscriptionStatus::Paid;
                updated.expires_at =
                    expiry_after_payment(&subscription, previous.as_ref(), Utc::now());
            }

            match self.update_subscription(updated).await? {
                Some(saved) => {
                    if covered {
                        info!(
                            payment_id = %payment.id,
                            subscription_id = %saved.id,
                            expires_at = ?saved.expires_at,
                            "payments: subscription paid"
                        );
                    } else {
                        warn!(
                            payment_id = %payment.id,
                            subscription_id = %saved.id,
                            amount_paid_minor = saved.amount_paid_minor,
                            outstanding_minor = saved.outstanding_minor(),
                            "payments: payment credited, subscription still owes a balance"
                        );
                    }
                    self.mark_applied(&payment, saved.amount_paid_minor).await;
                    if let Err(err) = self
                        .notifier
                        .payment_confirmed(saved, payment.clone())
                        .await
                    {
                        error!(payment_id = %payment.id, notify_error = ?err, "payments: confirmation notification failed");
                    }
                    return Ok(if covered {
                        ReconcileOutcome::Completed
                    } else {
                        ReconcileOutcome::BalanceOutstanding
                    });
                }
                None => warn!(
                    payment_id = %payment.id,
                    subscription_id = %subscription.id,
                    attempt,
                    "payments: subscription changed while settling, reloading"
                ),
            }
        }

        Err(BillingError::StaleWrite)
    }

    /// Records that the payment's amount is counted in the subscription, so a replay
    /// after a later top-up is not mistaken for a superseded payment.
    async fn mark_applied(&self, payment: &PaymentEntity, amount_paid_minor: i64) {
        let metadata = metadata_patch([
            (APPLIED_MARKER, json!(Utc::now().to_rfc3339())),
            ("subscription_amount_paid_minor", json!(amount_paid_minor)),
        ]);
        if let Err(err) = self.payment_repo.update_metadata(payment.id, metadata).await {
            error!(payment_id = %payment.id, db_error = ?err, "payments: failed to mark payment as applied");
        }
    }

    async fn mark_superseded(
        &self,
        payment: PaymentEntity,
        subscription: &SubscriptionEntity,
    ) -> BillingResult<ReconcileOutcome> {
        if payment.metadata.contains_key("requires_manual_refund") {
            return Ok(ReconcileOutcome::Superseded);
        }

        warn!(
            payment_id = %payment.id,
            subscription_id = %subscription.id,
            paid_by_payment_id = ?subscription.paid_by_payment_id,
            subscription_status = %subscription.payment_status,
            amount_minor = payment.amount_minor,
            "payments: completed payment superseded, manual refund required"
        );
        let metadata = metadata_patch([
            ("superseded_by", json!(subscription.paid_by_payment_id)),
            ("superseded_subscription_status", json!(subscription.payment_status)),
            ("requires_manual_refund", json!(true)),
        ]);
        self.payment_repo
            .update_metadata(payment.id, metadata)
            .await
            .map_err(|err| {
                error!(payment_id = %payment.id, db_error = ?err, "payments: failed to flag superseded payment");
                BillingError::Internal(err)
            })?;

        Ok(ReconcileOutcome::Superseded)
    }

    async fn apply_failure(
        &self,
        payment: PaymentEntity,
        reason: Option<String>,
        raw: Value,
    ) -> BillingResult<ReconcileOutcome> {
        let metadata = metadata_patch([
            ("failure_reason", json!(reason)),
            ("provider_payload", raw),
            ("failed_at", json!(Utc::now().to_rfc3339())),
        ]);

        let failed = match self
            .transition(&payment, PaymentStatus::Pending, PaymentStatus::Failed, metadata)
            .await?
        {
            Some(failed) => failed,
            None => {
                let current = self.load_payment(payment.id).await?;
                return Ok(match current.status {
                    PaymentStatus::Failed => ReconcileOutcome::AlreadyApplied,
                    status => {
                        warn!(
                            payment_id = %current.id,
                            payment_status = %status,
                            "payments: failure reported for a settled payment"
                        );
                        ReconcileOutcome::Ignored
                    }
                });
            }
        };
        info!(payment_id = %failed.id, reason = ?reason, "payments: payment failed");

        for attempt in 1..=RECONCILE_WRITE_ATTEMPTS {
            let subscription = self.load_subscription(failed.subscription_id).await?;
            if subscription.payment_status != SubscriptionStatus::Pending {
                return Ok(ReconcileOutcome::Failed);
            }

            let mut updated = subscription;
            updated.payment_status = SubscriptionStatus::Failed;
            match self.update_subscription(updated).await? {
                Some(saved) => {
                    if let Err(err) = self.notifier.payment_failed(saved, failed.clone()).await {
                        error!(payment_id = %failed.id, notify_error = ?err, "payments: failure notification failed");
                    }
                    return Ok(ReconcileOutcome::Failed);
                }
                None => warn!(
                    payment_id = %failed.id,
                    attempt,
                    "payments: subscription changed while failing, reloading"
                ),
            }
        }

        Err(BillingError::StaleWrite)
    }

    async fn reopen_failed_subscription(
        &self,
        subscription: SubscriptionEntity,
    ) -> BillingResult<SubscriptionEntity> {
        let mut reopened = subscription;
        reopened.payment_status = SubscriptionStatus::Pending;
        self.update_subscription(reopened)
            .await?
            .ok_or(BillingError::StaleWrite)
    }

    async fn status_info(
        &self,
        payment: PaymentEntity,
        provider_status: Option<ProviderStatus>,
        outcome: Option<ReconcileOutcome>,
    ) -> BillingResult<PaymentStatusInfo> {
        let subscription = self.load_subscription(payment.subscription_id).await?;
        Ok(PaymentStatusInfo {
            payment,
            subscription_status: subscription.payment_status,
            provider_status,
            outcome,
        })
    }

    fn gateway_for(&self, method: PaymentMethod) -> BillingResult<SharedGateway> {
        self.gateways.for_method(method).ok_or_else(|| {
            warn!(payment_method = %method, "payments: gateway not configured");
            BillingError::UnsupportedProvider(format!("{method} is not enabled"))
        })
    }

    async fn transition(
        &self,
        payment: &PaymentEntity,
        from: PaymentStatus,
        to: PaymentStatus,
        metadata: Map<String, Value>,
    ) -> BillingResult<Option<PaymentEntity>> {
        if !from.can_transition_to(to) {
            return Err(BillingError::InvalidStateTransition(format!(
                "payment cannot move from {from} to {to}"
            )));
        }
        self.payment_repo
            .transition_status(payment.id, from, to, metadata)
            .await
            .map_err(|err| {
                error!(payment_id = %payment.id, %from, %to, db_error = ?err, "payments: failed to update payment status");
                BillingError::Internal(err)
            })
    }

    async fn update_subscription(
        &self,
        subscription: SubscriptionEntity,
    ) -> BillingResult<Option<SubscriptionEntity>> {
        let subscription_id = subscription.id;
        self.subscription_repo
            .update_versioned(subscription)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payments: failed to update subscription");
                BillingError::Internal(err)
            })
    }

    async fn find_by_external_reference(
        &self,
        subscription_id: Uuid,
        external_reference: &str,
    ) -> BillingResult<Option<PaymentEntity>> {
        self.payment_repo
            .find_by_external_reference(subscription_id, external_reference.to_string())
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payments: failed to look up external reference");
                BillingError::Internal(err)
            })
    }

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> BillingResult<Option<SubscriptionEntity>> {
        self.subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payments: failed to load subscription");
                BillingError::Internal(err)
            })
    }

    async fn load_subscription(&self, subscription_id: Uuid) -> BillingResult<SubscriptionEntity> {
        self.find_subscription(subscription_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
    }

    async fn owned_subscription(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
    ) -> BillingResult<SubscriptionEntity> {
        match self.find_subscription(subscription_id).await? {
            Some(subscription) if subscription.owner_id == owner_id => Ok(subscription),
            _ => Err(BillingError::SubscriptionNotFound),
        }
    }

    async fn load_payment(&self, payment_id: Uuid) -> BillingResult<PaymentEntity> {
        self.payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(|err| {
                error!(%payment_id, db_error = ?err, "payments: failed to load payment");
                BillingError::Internal(err)
            })?
            .ok_or(BillingError::PaymentNotFound)
    }

    async fn owned_payment(&self, owner_id: Uuid, payment_id: Uuid) -> BillingResult<PaymentEntity> {
        let payment = self.load_payment(payment_id).await?;
        if payment.owner_id != owner_id {
            return Err(BillingError::PaymentNotFound);
        }
        Ok(payment)
    }
}

/// Status queries never change state, so every gateway failure is a provider error here.
fn provider_error(err: GatewayError) -> BillingError {
    BillingError::ProviderError {
        message: err.to_string(),
        raw: err.raw_payload(),
    }
}

#[cfg(test)]
mod tests;
