pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod retry;
pub mod service;
pub mod store;
pub mod translation;
pub mod validation;
pub mod web;
