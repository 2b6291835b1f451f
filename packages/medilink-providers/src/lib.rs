//! Outbound HTTP integrations: the OpenStreetMap Overpass pharmacy search and the notification
//! webhook.

pub mod overpass;
pub mod webhook;

mod error;

pub use error::{Error, Result};
