pub mod payment_notifications;
pub mod payments;
pub mod plans;
pub mod resource_usage;
pub mod subscriptions;
