// src/services/mod.rs
pub mod blacklist;
pub mod db;
pub mod ranking;
pub mod screening;
pub mod yahoo;
