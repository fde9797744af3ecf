//! Database layer for the libSQL destination store

mod connection;
mod migrations;

pub use connection::Database;
