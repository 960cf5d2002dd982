//! Core of the pingcompose gateway.
//!
//! A Pingora based HTTP front that answers routes by fanning each request out
//! into a small dependency graph of backend calls and joining the results into
//! one composite JSON payload.

#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod core;
pub mod logging;
pub mod orchestration;
pub mod plugin;
pub mod proxy;
pub mod service;
pub(crate) mod utils;
