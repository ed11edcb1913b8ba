//! Outbound client for the Razorpay Orders API.

pub mod client;
pub mod error;
pub mod models;

pub use client::{RazorpayClient, RazorpayConfig};
pub use error::{GatewayError, Result};
