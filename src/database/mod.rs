// Database module
// SQLite record store for uploaded documents

pub mod sqlite;

pub use sqlite::*;
