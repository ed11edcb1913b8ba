pub mod admin;
pub mod event_teams;
pub mod payments;
pub mod registration;
pub mod teams;
