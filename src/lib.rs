//! Wallet connection core for a browser dApp.
//!
//! Detects an injected EIP-1193 wallet, connects it, keeps it on one
//! required chain and reconciles the wallet's own account and network
//! changes into a single observable [`models::ConnectionState`].

pub mod app;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;
