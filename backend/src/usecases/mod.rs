pub mod errors;
pub mod payments;
pub mod plan_catalog;
pub mod plan_resolver;
pub mod quota;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod test_support;
