pub mod account;
pub mod admin_session;
pub mod billing;
pub mod config;
pub mod error;
pub mod gateway;
pub mod plans;
pub mod ratings;
pub mod secrets;
pub mod store;
pub mod trial;
pub mod upstream;
pub mod usage;
