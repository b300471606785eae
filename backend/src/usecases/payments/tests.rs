use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::anyhow;
use crates::{
    domain::{
        entities::plans::PlanEntity,
        repositories::{
            payment_notifications::MockPaymentNotifier, payments::MockPaymentRepository,
            plans::MockPlanRepository, subscriptions::MockSubscriptionRepository,
        },
        value_objects::subscriptions::UpgradeSubscriptionRequest,
    },
    payments::gateway::{MockMobileMoneyGateway, ProviderCallback, TransferAccepted},
};

use super::*;
use crate::usecases::{
    plan_catalog::PlanCatalog,
    subscriptions::SubscriptionUseCase,
    test_support::{paid, payment, plan, subscription},
};

/// Backing state shared by the repository mocks so writes are visible to later reads.
#[derive(Default)]
struct Store {
    subscriptions: Mutex<HashMap<Uuid, SubscriptionEntity>>,
    payments: Mutex<HashMap<Uuid, PaymentEntity>>,
    stale_writes: AtomicUsize,
    failing_metadata_writes: AtomicUsize,
}

impl Store {
    fn with(subscriptions: Vec<SubscriptionEntity>, payments: Vec<PaymentEntity>) -> Arc<Self> {
        let store = Store::default();
        for subscription in subscriptions {
            store
                .subscriptions
                .lock()
                .unwrap()
                .insert(subscription.id, subscription);
        }
        for payment in payments {
            store.payments.lock().unwrap().insert(payment.id, payment);
        }
        Arc::new(store)
    }

    fn subscription(&self, id: Uuid) -> SubscriptionEntity {
        self.subscriptions.lock().unwrap()[&id].clone()
    }

    fn payment(&self, id: Uuid) -> PaymentEntity {
        self.payments.lock().unwrap()[&id].clone()
    }

    fn payments_for(&self, subscription_id: Uuid) -> Vec<PaymentEntity> {
        self.payments
            .lock()
            .unwrap()
            .values()
            .filter(|payment| payment.subscription_id == subscription_id)
            .cloned()
            .collect()
    }
}

fn subscription_repo(store: &Arc<Store>) -> MockSubscriptionRepository {
    let mut repo = MockSubscriptionRepository::new();

    let state = Arc::clone(store);
    repo.expect_find_by_id()
        .returning(move |id| Ok(state.subscriptions.lock().unwrap().get(&id).cloned()));

    let state = Arc::clone(store);
    repo.expect_update_versioned().returning(move |subscription| {
        if state.stale_writes.load(Ordering::SeqCst) > 0 {
            state.stale_writes.fetch_sub(1, Ordering::SeqCst);
            return Ok(None);
        }
        let mut subscriptions = state.subscriptions.lock().unwrap();
        match subscriptions.get(&subscription.id) {
            Some(stored) if stored.version == subscription.version => {
                let mut saved = subscription;
                saved.version += 1;
                subscriptions.insert(saved.id, saved.clone());
                Ok(Some(saved))
            }
            _ => Ok(None),
        }
    });

    repo
}

fn payment_repo(store: &Arc<Store>) -> MockPaymentRepository {
    let mut repo = MockPaymentRepository::new();

    let state = Arc::clone(store);
    repo.expect_insert().returning(move |insert| {
        let now = Utc::now();
        let payment = PaymentEntity {
            id: Uuid::new_v4(),
            subscription_id: insert.subscription_id,
            owner_id: insert.owner_id,
            amount_minor: insert.amount_minor,
            currency: insert.currency,
            payment_method: PaymentMethod::from_str(&insert.payment_method)
                .ok_or_else(|| anyhow!("bad method"))?,
            phone_number: insert.phone_number,
            external_reference: insert.external_reference,
            transaction_reference: insert.transaction_reference,
            status: PaymentStatus::from_str(&insert.status).ok_or_else(|| anyhow!("bad status"))?,
            metadata: insert.metadata.as_object().cloned().unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        state
            .payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        Ok(payment)
    });

    let state = Arc::clone(store);
    repo.expect_find_by_id()
        .returning(move |id| Ok(state.payments.lock().unwrap().get(&id).cloned()));

    let state = Arc::clone(store);
    repo.expect_find_by_external_reference()
        .returning(move |subscription_id, reference| {
            Ok(state
                .payments_for(subscription_id)
                .into_iter()
                .find(|payment| payment.external_reference == reference))
        });

    let state = Arc::clone(store);
    repo.expect_find_by_transaction_reference()
        .returning(move |method, reference| {
            Ok(state
                .payments
                .lock()
                .unwrap()
                .values()
                .find(|payment| {
                    payment.payment_method == method
                        && payment.transaction_reference.as_deref() == Some(reference.as_str())
                })
                .cloned())
        });

    let state = Arc::clone(store);
    repo.expect_list_by_subscription()
        .returning(move |subscription_id| Ok(state.payments_for(subscription_id)));

    let state = Arc::clone(store);
    repo.expect_transition_status()
        .returning(move |id, from, to, metadata| {
            let mut payments = state.payments.lock().unwrap();
            let payment = payments.get_mut(&id).ok_or_else(|| anyhow!("payment missing"))?;
            if payment.status != from {
                return Ok(None);
            }
            payment.status = to;
            payment.metadata.extend(metadata);
            Ok(Some(payment.clone()))
        });

    let state = Arc::clone(store);
    repo.expect_update_metadata().returning(move |id, metadata| {
        if state.failing_metadata_writes.load(Ordering::SeqCst) > 0 {
            state.failing_metadata_writes.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("connection closed"));
        }
        let mut payments = state.payments.lock().unwrap();
        let payment = payments.get_mut(&id).ok_or_else(|| anyhow!("payment missing"))?;
        payment.metadata.extend(metadata);
        Ok(payment.clone())
    });

    repo
}

fn accepting_gateway(method: PaymentMethod) -> MockMobileMoneyGateway {
    let mut gateway = MockMobileMoneyGateway::new();
    gateway.expect_provider().return_const(method);
    gateway
        .expect_reserve_reference()
        .returning(|| Ok(Uuid::new_v4().to_string()));
    gateway.expect_request_transfer().returning(|request| {
        Ok(TransferAccepted {
            transaction_reference: request.transaction_reference,
            raw: json!({ "accepted": true }),
        })
    });
    gateway
}

fn idle_gateway(method: PaymentMethod) -> MockMobileMoneyGateway {
    let mut gateway = MockMobileMoneyGateway::new();
    gateway.expect_provider().return_const(method);
    gateway
}

fn use_case(
    store: &Arc<Store>,
    gateways: Vec<MockMobileMoneyGateway>,
    notifier: MockPaymentNotifier,
) -> PaymentUseCase {
    let gateways = gateways
        .into_iter()
        .fold(PaymentGateways::new(), |registry, gateway| {
            registry.register(Arc::new(gateway))
        });
    PaymentUseCase::new(
        Arc::new(subscription_repo(store)),
        Arc::new(payment_repo(store)),
        gateways,
        Arc::new(notifier),
        "XAF".to_string(),
    )
}

/// Subscription use case over the same store, for upgrades made while a payment is in flight.
fn subscription_use_case(store: &Arc<Store>, plans: Vec<PlanEntity>) -> SubscriptionUseCase {
    let mut plan_repo = MockPlanRepository::new();
    plan_repo
        .expect_list_active_plans()
        .returning(move || Ok(plans.clone()));
    plan_repo.expect_find_by_id().returning(|_| Ok(None));
    SubscriptionUseCase::new(
        Arc::new(PlanCatalog::new(Arc::new(plan_repo))),
        Arc::new(subscription_repo(store)),
    )
}

fn upgrade_to_premium() -> UpgradeSubscriptionRequest {
    UpgradeSubscriptionRequest {
        plan_type: "premium".to_string(),
        guest_count: 160,
    }
}

fn successful() -> ProviderStatusReport {
    ProviderStatusReport {
        status: ProviderStatus::Successful,
        raw: json!({ "status": "SUCCESSFUL" }),
    }
}

fn failed() -> ProviderStatusReport {
    ProviderStatusReport {
        status: ProviderStatus::Failed {
            reason: Some("PAYER_NOT_FOUND".to_string()),
        },
        raw: json!({ "status": "FAILED", "reason": "PAYER_NOT_FOUND" }),
    }
}

fn pending_subscription() -> SubscriptionEntity {
    subscription(&plan("basic", 10_000, 50, 70), Uuid::new_v4(), 80)
}

#[tokio::test]
async fn initiate_creates_pending_payment_for_outstanding_amount() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let use_case = use_case(
        &store,
        vec![accepting_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "+237 677 12 34 56", "order-1")
        .await
        .unwrap();

    assert!(!result.replayed);
    assert_eq!(result.payment.status, PaymentStatus::Pending);
    assert_eq!(result.payment.amount_minor, 12_100);
    assert_eq!(result.payment.payment_method, PaymentMethod::MtnMomo);
    assert_eq!(result.payment.phone_number, "237677123456");
    assert!(result.reference.is_some());
    let stored = store.payment(result.payment.id);
    assert_eq!(stored.transaction_reference, result.reference);
    assert_eq!(stored.metadata["transfer_response"], json!({ "accepted": true }));
    assert!(stored.metadata.contains_key("initiated_at"));
}

#[tokio::test]
async fn same_external_reference_replays_without_new_transfer() {
    let sub = pending_subscription();
    let existing = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![existing.clone()]);
    let use_case = use_case(
        &store,
        vec![idle_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-1")
        .await
        .unwrap();

    assert!(result.replayed);
    assert_eq!(result.payment.id, existing.id);
    assert_eq!(store.payments_for(sub.id).len(), 1);
}

#[tokio::test]
async fn unknown_operator_prefix_writes_nothing() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let use_case = use_case(
        &store,
        vec![idle_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "622123456", "order-1")
        .await;

    assert!(matches!(result, Err(BillingError::UnsupportedProvider(_))));
    assert!(store.payments_for(sub.id).is_empty());
}

#[tokio::test]
async fn operator_without_configured_gateway_is_unsupported() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let use_case = use_case(
        &store,
        vec![idle_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "699123456", "order-1")
        .await;

    assert!(matches!(result, Err(BillingError::UnsupportedProvider(_))));
    assert!(store.payments_for(sub.id).is_empty());
}

#[tokio::test]
async fn malformed_phone_is_invalid_input() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "67712", "order-1")
        .await;

    assert!(matches!(result, Err(BillingError::InvalidInput(_))));
}

#[tokio::test]
async fn paid_subscription_cannot_start_a_payment() {
    let sub = paid(pending_subscription(), Uuid::new_v4());
    let store = Store::with(vec![sub.clone()], vec![]);
    let use_case = use_case(
        &store,
        vec![idle_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-1")
        .await;

    assert!(matches!(result, Err(BillingError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn provider_rejection_marks_payment_failed() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let mut gateway = idle_gateway(PaymentMethod::OrangeMoney);
    gateway
        .expect_reserve_reference()
        .returning(|| Ok("v1a2b3c4d5e6f".to_string()));
    gateway.expect_request_transfer().returning(|_| {
        Err(GatewayError::Rejected {
            provider: PaymentMethod::OrangeMoney,
            status: 400,
            raw: json!({ "message": "insufficient balance" }),
        })
    });
    let use_case = use_case(&store, vec![gateway], MockPaymentNotifier::new());

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "699123456", "order-1")
        .await;

    match result {
        Err(BillingError::ProviderError { raw, .. }) => {
            assert_eq!(raw, json!({ "message": "insufficient balance" }));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    let stored = store.payments_for(sub.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, PaymentStatus::Failed);
    assert!(stored[0].metadata.contains_key("failure_reason"));
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Pending
    );
}

#[tokio::test]
async fn reference_reservation_failure_creates_no_payment() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let mut gateway = idle_gateway(PaymentMethod::OrangeMoney);
    gateway.expect_reserve_reference().returning(|| {
        Err(GatewayError::Transport {
            provider: PaymentMethod::OrangeMoney,
            message: "timed out".to_string(),
        })
    });
    gateway.expect_request_transfer().never();
    let use_case = use_case(&store, vec![gateway], MockPaymentNotifier::new());

    let result = use_case
        .initiate_payment(sub.owner_id, sub.id, "699123456", "order-1")
        .await;

    assert!(matches!(result, Err(BillingError::ProviderError { .. })));
    assert!(store.payments_for(sub.id).is_empty());
}

#[tokio::test]
async fn accepted_transfer_stays_reconcilable_when_later_write_fails() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    store.failing_metadata_writes.store(1, Ordering::SeqCst);
    let mut gateway = accepting_gateway(PaymentMethod::MtnMomo);
    gateway
        .expect_query_status()
        .times(1)
        .returning(|_| Ok(successful()));
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![gateway], notifier);

    let initiated = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-1")
        .await
        .unwrap();

    let stored = store.payment(initiated.payment.id);
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(stored.transaction_reference.is_some());
    assert_eq!(stored.transaction_reference, initiated.reference);
    assert!(!stored.metadata.contains_key("transfer_response"));

    let info = use_case
        .poll_payment_status(sub.owner_id, initiated.payment.id)
        .await
        .unwrap();

    assert_eq!(info.outcome, Some(ReconcileOutcome::Completed));
    assert_eq!(info.payment.status, PaymentStatus::Completed);
    assert_eq!(info.subscription_status, SubscriptionStatus::Paid);
}

#[tokio::test]
async fn two_initiations_with_different_keys_settle_exactly_once() {
    let sub = pending_subscription();
    let store = Store::with(vec![sub.clone()], vec![]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(
        &store,
        vec![accepting_gateway(PaymentMethod::MtnMomo)],
        notifier,
    );

    let first = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-1")
        .await
        .unwrap();
    let second = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-2")
        .await
        .unwrap();

    assert!(!first.replayed && !second.replayed);
    assert_ne!(first.payment.id, second.payment.id);
    assert_ne!(first.reference, second.reference);
    let stored = store.payments_for(sub.id);
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|payment| {
        payment.status == PaymentStatus::Pending && payment.amount_minor == 12_100
    }));

    let first_outcome = use_case
        .reconcile(first.payment.clone(), successful())
        .await
        .unwrap();
    let second_outcome = use_case
        .reconcile(second.payment.clone(), successful())
        .await
        .unwrap();

    assert_eq!(first_outcome, ReconcileOutcome::Completed);
    assert_eq!(second_outcome, ReconcileOutcome::Superseded);
    let settled = store.subscription(sub.id);
    assert_eq!(settled.payment_status, SubscriptionStatus::Paid);
    assert_eq!(settled.amount_paid_minor, 12_100);
    assert_eq!(settled.paid_by_payment_id, Some(first.payment.id));
    assert_eq!(
        store.payment(second.payment.id).metadata["requires_manual_refund"],
        json!(true)
    );
}

#[tokio::test]
async fn successful_outcome_is_applied_once() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![], notifier);

    let first = use_case.reconcile(pending.clone(), successful()).await.unwrap();
    let second = use_case.reconcile(pending.clone(), successful()).await.unwrap();

    assert_eq!(first, ReconcileOutcome::Completed);
    assert_eq!(second, ReconcileOutcome::AlreadyApplied);

    let settled = store.subscription(sub.id);
    assert_eq!(settled.payment_status, SubscriptionStatus::Paid);
    assert_eq!(settled.amount_paid_minor, 12_100);
    assert_eq!(settled.paid_by_payment_id, Some(pending.id));
    assert!(settled.expires_at.is_some_and(|expires_at| expires_at > Utc::now()));
    assert_eq!(store.payment(pending.id).status, PaymentStatus::Completed);
}

#[tokio::test]
async fn second_payment_for_settled_subscription_is_superseded() {
    let sub = pending_subscription();
    let first = payment(&sub, PaymentStatus::Pending, "order-1");
    let second = payment(&sub, PaymentStatus::Pending, "order-2");
    let store = Store::with(vec![sub.clone()], vec![first.clone(), second.clone()]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![], notifier);

    let first_outcome = use_case.reconcile(first.clone(), successful()).await.unwrap();
    let second_outcome = use_case.reconcile(second.clone(), successful()).await.unwrap();

    assert_eq!(first_outcome, ReconcileOutcome::Completed);
    assert_eq!(second_outcome, ReconcileOutcome::Superseded);

    let settled = store.subscription(sub.id);
    assert_eq!(settled.paid_by_payment_id, Some(first.id));
    assert_eq!(settled.amount_paid_minor, 12_100);

    let superseded = store.payment(second.id);
    assert_eq!(superseded.status, PaymentStatus::Completed);
    assert_eq!(superseded.metadata["requires_manual_refund"], json!(true));
    assert_eq!(superseded.metadata["superseded_by"], json!(first.id));
}

#[tokio::test]
async fn upgrade_during_pending_payment_leaves_balance_outstanding() {
    let basic = plan("basic", 10_000, 50, 70);
    let premium = plan("premium", 25_000, 150, 50);
    let sub = subscription(&basic, Uuid::new_v4(), 80);
    let first = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![first.clone()]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(2)
        .returning(|_, _| Ok(()));
    let use_case = use_case(
        &store,
        vec![accepting_gateway(PaymentMethod::MtnMomo)],
        notifier,
    );
    let subscriptions = subscription_use_case(&store, vec![basic, premium]);

    let upgraded = subscriptions
        .upgrade_subscription(sub.owner_id, sub.id, upgrade_to_premium())
        .await
        .unwrap();
    assert_eq!(upgraded.total_price_minor, 25_500);

    let outcome = use_case.reconcile(first.clone(), successful()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::BalanceOutstanding);
    let owing = store.subscription(sub.id);
    assert_eq!(owing.payment_status, SubscriptionStatus::Pending);
    assert_eq!(owing.amount_paid_minor, 12_100);
    assert_eq!(owing.outstanding_minor(), 13_400);
    assert!(owing.expires_at.is_none());
    assert_eq!(store.payment(first.id).status, PaymentStatus::Completed);

    let top_up = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-2")
        .await
        .unwrap();
    assert_eq!(top_up.payment.amount_minor, 13_400);

    let outcome = use_case
        .reconcile(top_up.payment.clone(), successful())
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Completed);
    let settled = store.subscription(sub.id);
    assert_eq!(settled.payment_status, SubscriptionStatus::Paid);
    assert_eq!(settled.amount_paid_minor, 25_500);
    assert_eq!(settled.paid_by_payment_id, Some(top_up.payment.id));
    assert!(settled.expires_at.is_some_and(|expires_at| expires_at > Utc::now()));

    let replay = use_case.reconcile(first.clone(), successful()).await.unwrap();
    assert_eq!(replay, ReconcileOutcome::AlreadyApplied);
    assert_eq!(store.subscription(sub.id).amount_paid_minor, 25_500);
}

#[tokio::test]
async fn upgrade_after_settlement_needs_a_top_up_before_paid() {
    let basic = plan("basic", 10_000, 50, 70);
    let premium = plan("premium", 25_000, 150, 50);
    let sub = subscription(&basic, Uuid::new_v4(), 80);
    let first = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![first.clone()]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(2)
        .returning(|_, _| Ok(()));
    let use_case = use_case(
        &store,
        vec![accepting_gateway(PaymentMethod::MtnMomo)],
        notifier,
    );
    let subscriptions = subscription_use_case(&store, vec![basic, premium]);

    let outcome = use_case.reconcile(first.clone(), successful()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Completed);
    let period_end = store.subscription(sub.id).expires_at;
    assert!(period_end.is_some());

    let upgraded = subscriptions
        .upgrade_subscription(sub.owner_id, sub.id, upgrade_to_premium())
        .await
        .unwrap();
    assert_eq!(upgraded.payment_status, SubscriptionStatus::Pending);
    assert_eq!(upgraded.outstanding_minor(), 13_400);

    let top_up = use_case
        .initiate_payment(sub.owner_id, sub.id, "677123456", "order-2")
        .await
        .unwrap();
    assert_eq!(top_up.payment.amount_minor, 13_400);

    let outcome = use_case
        .reconcile(top_up.payment.clone(), successful())
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Completed);
    let settled = store.subscription(sub.id);
    assert_eq!(settled.payment_status, SubscriptionStatus::Paid);
    assert_eq!(settled.amount_paid_minor, 25_500);
    assert_eq!(settled.expires_at, period_end);

    let replay = use_case.reconcile(first.clone(), successful()).await.unwrap();
    assert_eq!(replay, ReconcileOutcome::AlreadyApplied);
    assert!(!store.payment(first.id).metadata.contains_key("requires_manual_refund"));
}

#[tokio::test]
async fn status_change_keeps_metadata_written_since_the_payment_was_read() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![], notifier);

    let unknown = ProviderStatusReport {
        status: ProviderStatus::Unknown {
            raw_status: "ONGOING".to_string(),
        },
        raw: json!({ "status": "ONGOING" }),
    };
    let _ = use_case.reconcile(pending.clone(), unknown).await;

    // `pending` is the snapshot read before the note above was written.
    let outcome = use_case.reconcile(pending.clone(), successful()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Completed);
    let stored = store.payment(pending.id);
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(
        stored.metadata["unreconciled_provider_payload"],
        json!({ "status": "ONGOING" })
    );
    assert!(stored.metadata.contains_key("completed_at"));
    assert!(stored.metadata.contains_key("applied_at"));
}

#[tokio::test]
async fn lost_races_surface_as_stale_write_and_converge_on_replay() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    store.stale_writes.store(3, Ordering::SeqCst);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![], notifier);

    let result = use_case.reconcile(pending.clone(), successful()).await;
    assert!(matches!(result, Err(BillingError::StaleWrite)));
    assert_eq!(store.payment(pending.id).status, PaymentStatus::Completed);
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Pending
    );

    let replay = use_case.reconcile(pending.clone(), successful()).await.unwrap();
    assert_eq!(replay, ReconcileOutcome::Completed);
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Paid
    );
}

#[tokio::test]
async fn failed_outcome_fails_payment_and_subscription_once() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_failed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![], notifier);

    let first = use_case.reconcile(pending.clone(), failed()).await.unwrap();
    let second = use_case.reconcile(pending.clone(), failed()).await.unwrap();

    assert_eq!(first, ReconcileOutcome::Failed);
    assert_eq!(second, ReconcileOutcome::AlreadyApplied);
    assert_eq!(store.payment(pending.id).status, PaymentStatus::Failed);
    assert_eq!(
        store.payment(pending.id).metadata["failure_reason"],
        json!("PAYER_NOT_FOUND")
    );
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Failed
    );
}

#[tokio::test]
async fn late_failure_after_completion_is_ignored() {
    let sub = pending_subscription();
    let completed = payment(&sub, PaymentStatus::Completed, "order-1");
    let sub = paid(sub, completed.id);
    let store = Store::with(vec![sub.clone()], vec![completed.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let outcome = use_case.reconcile(completed.clone(), failed()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert_eq!(store.payment(completed.id).status, PaymentStatus::Completed);
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Paid
    );
}

#[tokio::test]
async fn pending_outcome_changes_nothing() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let report = ProviderStatusReport {
        status: ProviderStatus::Pending,
        raw: json!({ "status": "PENDING" }),
    };
    let outcome = use_case.reconcile(pending.clone(), report).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::StillPending);
    assert_eq!(store.payment(pending.id), pending);
}

#[tokio::test]
async fn unknown_provider_status_is_kept_for_review() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let report = ProviderStatusReport {
        status: ProviderStatus::Unknown {
            raw_status: "ONGOING".to_string(),
        },
        raw: json!({ "status": "ONGOING" }),
    };
    let result = use_case.reconcile(pending.clone(), report).await;

    assert!(matches!(result, Err(BillingError::ProviderError { .. })));
    let stored = store.payment(pending.id);
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(
        stored.metadata["unreconciled_provider_payload"],
        json!({ "status": "ONGOING" })
    );
}

#[tokio::test]
async fn refunding_a_pending_payment_is_rejected() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let result = use_case
        .refund_payment(Uuid::new_v4(), pending.id, Some("duplicate".to_string()))
        .await;

    assert!(matches!(
        result,
        Err(BillingError::NotRefundable(PaymentStatus::Pending))
    ));
    assert_eq!(store.payment(pending.id), pending);
}

#[tokio::test]
async fn refund_closes_the_subscription_it_paid_for() {
    let sub = pending_subscription();
    let completed = payment(&sub, PaymentStatus::Completed, "order-1");
    let sub = paid(sub, completed.id);
    let store = Store::with(vec![sub.clone()], vec![completed.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let refunded = use_case
        .refund_payment(Uuid::new_v4(), completed.id, Some("event cancelled".to_string()))
        .await
        .unwrap();

    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.metadata["refund_reason"], json!("event cancelled"));
    let closed = store.subscription(sub.id);
    assert_eq!(closed.payment_status, SubscriptionStatus::Refunded);
    assert!(!closed.is_active(Utc::now()));

    let again = use_case.refund_payment(Uuid::new_v4(), completed.id, None).await;
    assert!(matches!(
        again,
        Err(BillingError::NotRefundable(PaymentStatus::Refunded))
    ));
}

#[tokio::test]
async fn retry_opens_a_new_payment_and_keeps_the_failed_one() {
    let mut sub = pending_subscription();
    sub.payment_status = SubscriptionStatus::Failed;
    let failed_payment = payment(&sub, PaymentStatus::Failed, "order-1");
    let store = Store::with(vec![sub.clone()], vec![failed_payment.clone()]);
    let use_case = use_case(
        &store,
        vec![accepting_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let retried = use_case
        .retry_payment(sub.owner_id, failed_payment.id, "677123456", None)
        .await
        .unwrap();

    assert_ne!(retried.payment.id, failed_payment.id);
    assert_ne!(retried.payment.external_reference, "order-1");
    assert_eq!(retried.payment.amount_minor, sub.total_price_minor);
    assert_eq!(retried.payment.status, PaymentStatus::Pending);
    assert_eq!(store.payment(failed_payment.id), failed_payment);
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Pending
    );
}

#[tokio::test]
async fn only_failed_payments_can_be_retried() {
    let sub = pending_subscription();
    let completed = payment(&sub, PaymentStatus::Completed, "order-1");
    let store = Store::with(vec![sub.clone()], vec![completed.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let result = use_case
        .retry_payment(sub.owner_id, completed.id, "677123456", None)
        .await;

    assert!(matches!(
        result,
        Err(BillingError::NotRetryable(PaymentStatus::Completed))
    ));
}

#[tokio::test]
async fn polling_a_terminal_payment_skips_the_provider() {
    let sub = pending_subscription();
    let completed = payment(&sub, PaymentStatus::Completed, "order-1");
    let sub = paid(sub, completed.id);
    let store = Store::with(vec![sub.clone()], vec![completed.clone()]);
    let use_case = use_case(
        &store,
        vec![idle_gateway(PaymentMethod::MtnMomo)],
        MockPaymentNotifier::new(),
    );

    let info = use_case
        .poll_payment_status(sub.owner_id, completed.id)
        .await
        .unwrap();

    assert_eq!(info.payment.status, PaymentStatus::Completed);
    assert_eq!(info.subscription_status, SubscriptionStatus::Paid);
    assert!(info.provider_status.is_none());
}

#[tokio::test]
async fn polling_applies_the_provider_outcome() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut gateway = idle_gateway(PaymentMethod::MtnMomo);
    let reference = pending.id.to_string();
    gateway
        .expect_query_status()
        .withf(move |transaction_reference| transaction_reference == &reference)
        .times(1)
        .returning(|_| Ok(successful()));
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![gateway], notifier);

    let info = use_case
        .poll_payment_status(sub.owner_id, pending.id)
        .await
        .unwrap();

    assert_eq!(info.payment.status, PaymentStatus::Completed);
    assert_eq!(info.subscription_status, SubscriptionStatus::Paid);
    assert_eq!(info.provider_status, Some(ProviderStatus::Successful));
    assert_eq!(info.outcome, Some(ReconcileOutcome::Completed));
}

#[tokio::test]
async fn provider_outage_during_poll_leaves_payment_pending() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut gateway = idle_gateway(PaymentMethod::MtnMomo);
    gateway.expect_query_status().returning(|_| {
        Err(GatewayError::Transport {
            provider: PaymentMethod::MtnMomo,
            message: "connection reset".to_string(),
        })
    });
    let use_case = use_case(&store, vec![gateway], MockPaymentNotifier::new());

    let result = use_case.poll_payment_status(sub.owner_id, pending.id).await;

    assert!(matches!(result, Err(BillingError::ProviderError { .. })));
    assert_eq!(store.payment(pending.id), pending);
}

#[tokio::test]
async fn another_owner_cannot_poll_a_payment() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let result = use_case.poll_payment_status(Uuid::new_v4(), pending.id).await;

    assert!(matches!(result, Err(BillingError::PaymentNotFound)));
}

#[tokio::test]
async fn callback_with_bad_signature_changes_nothing() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut gateway = idle_gateway(PaymentMethod::MtnMomo);
    gateway
        .expect_parse_callback()
        .returning(|_, _| Err(GatewayError::InvalidSignature));
    let use_case = use_case(&store, vec![gateway], MockPaymentNotifier::new());

    let result = use_case
        .handle_provider_callback("mtn_momo", br#"{"status":"SUCCESSFUL"}"#, Some("bad".to_string()))
        .await;

    assert!(matches!(result, Err(BillingError::InvalidSignature)));
    assert_eq!(store.payment(pending.id), pending);
}

#[tokio::test]
async fn callback_for_unknown_provider_is_unsupported() {
    let store = Store::with(vec![], vec![]);
    let use_case = use_case(&store, vec![], MockPaymentNotifier::new());

    let result = use_case
        .handle_provider_callback("paypal", b"{}", None)
        .await;

    assert!(matches!(result, Err(BillingError::UnsupportedProvider(_))));
}

#[tokio::test]
async fn verified_callback_completes_the_payment() {
    let sub = pending_subscription();
    let pending = payment(&sub, PaymentStatus::Pending, "order-1");
    let store = Store::with(vec![sub.clone()], vec![pending.clone()]);
    let mut gateway = idle_gateway(PaymentMethod::MtnMomo);
    let reference = pending.id.to_string();
    gateway.expect_parse_callback().returning(move |_, _| {
        Ok(ProviderCallback {
            reference: reference.clone(),
            report: successful(),
        })
    });
    let mut notifier = MockPaymentNotifier::new();
    notifier
        .expect_payment_confirmed()
        .times(1)
        .returning(|_, _| Ok(()));
    let use_case = use_case(&store, vec![gateway], notifier);

    let outcome = use_case
        .handle_provider_callback("mtn_momo", b"{}", Some("signed".to_string()))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Completed);
    assert_eq!(
        store.subscription(sub.id).payment_status,
        SubscriptionStatus::Paid
    );
}

#[tokio::test]
async fn callback_for_unknown_transaction_is_not_found() {
    let store = Store::with(vec![], vec![]);
    let mut gateway = idle_gateway(PaymentMethod::OrangeMoney);
    gateway.expect_parse_callback().returning(|_, _| {
        Ok(ProviderCallback {
            reference: "MP240101.0000.A00001".to_string(),
            report: successful(),
        })
    });
    let use_case = use_case(&store, vec![gateway], MockPaymentNotifier::new());

    let result = use_case
        .handle_provider_callback("orange_money", b"{}", Some("signed".to_string()))
        .await;

    assert!(matches!(result, Err(BillingError::PaymentNotFound)));
}
