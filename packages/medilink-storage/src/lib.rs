pub mod appointments;
pub mod availability;
pub mod db;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod records;
pub mod schema;
pub mod users;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
