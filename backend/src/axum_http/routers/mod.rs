pub mod billing;
pub mod payments;
pub mod subscriptions;
