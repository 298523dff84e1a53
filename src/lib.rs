pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod response;
pub mod screening;
pub mod state;
pub mod subscriptions;
pub mod test_utils;
pub mod users;
