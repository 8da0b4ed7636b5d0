// Database service module
// SQLite connection and schema management for the local event store

mod connection;
mod schema;

pub use connection::Database;
