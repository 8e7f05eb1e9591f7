pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod kv;
pub mod models;
pub mod slack;
