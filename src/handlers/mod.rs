// src/handlers/mod.rs
pub mod admin;
pub mod error;
pub mod stats;
pub mod stocks;
