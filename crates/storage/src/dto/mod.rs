pub mod admin;
pub mod common;
pub mod payment;
pub mod team;
pub mod webhook;
