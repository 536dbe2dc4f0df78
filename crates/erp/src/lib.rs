//! HTTP client for the ERP connector's sync job endpoints.

pub mod client;

pub use client::ErpClient;
