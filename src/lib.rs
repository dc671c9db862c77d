pub mod auth;
pub mod backup;
pub mod db;
pub mod domain;
pub mod import;
pub mod mail;
pub mod models;
pub mod routes;
pub mod sms;
pub mod state;
