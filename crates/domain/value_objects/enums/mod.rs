pub mod payment_methods;
pub mod payment_statuses;
pub mod resource_kinds;
pub mod subscription_statuses;
