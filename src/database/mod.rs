pub mod connector;
pub mod models;
pub mod types;

pub use connector::{DB, connect, connect_with_settings, ping};
