pub mod cli;
pub mod config;
pub mod error;
pub mod fields;
pub mod gateway;
pub mod model;
pub mod sync;
pub mod views;
pub mod webhook;
