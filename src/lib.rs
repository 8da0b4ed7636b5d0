// Calendar engine library
// Exports all modules for the replay binary and integration tests

pub mod error;
pub mod models;
pub mod services;
pub mod utils;
