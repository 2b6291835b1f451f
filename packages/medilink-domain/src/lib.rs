pub mod geo;
pub mod notification;
pub mod role;
pub mod schedule;
pub mod status;
