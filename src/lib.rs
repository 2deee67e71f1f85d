pub mod config;
pub mod poller;
pub mod redemption;
pub mod service;
pub mod service_client;
pub mod session;
pub mod workflow;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
