//! Route handlers module.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod contact;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod plates;
pub mod products;
pub mod registration;
pub mod sensors;
pub mod suppliers;
