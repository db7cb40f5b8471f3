//! Company Insight - Multi-step AI answers about companies.
//!
//! This crate answers a question about a company, identified by its domain,
//! by running a fixed pipeline of prompts against a text-generation provider
//! and streaming the final answer as plain text.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
