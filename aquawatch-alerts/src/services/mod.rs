pub mod alert_service;
pub mod risk_service;
pub mod subscription_service;
