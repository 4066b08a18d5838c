pub mod alerts;
pub mod health;
pub mod risk;
pub mod subscriptions;
