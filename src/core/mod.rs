//! Core business logic module

pub mod advertisement;
pub mod api;
pub mod command;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod persistence;
pub mod scanner;
pub mod types;
