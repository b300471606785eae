pub mod enums;
pub mod payments;
pub mod phone_numbers;
pub mod plans;
pub mod pricing;
pub mod quota;
pub mod subscriptions;
