//! API request handlers

pub mod analytics;
pub mod campaigns;
pub mod health;
pub mod recipients;
pub mod reminders;
pub mod templates;
