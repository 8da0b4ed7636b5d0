// Service module exports

pub mod cache;
pub mod database;
pub mod deletion;
pub mod drag;
pub mod editor;
pub mod geometry;
pub mod recurrence;
pub mod settings;
pub mod store;
