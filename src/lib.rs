pub mod auth;
pub mod bus;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod services;

pub use db::create_pool;
