//! Core types, errors, and read-only rule tables

pub mod config;
pub mod error;
pub mod types;
