// HiResGo! gallery backend
// Folders, drag-ordered images, shares, and plan management over SQLite.

pub mod api;
pub mod auth;
pub mod models;
pub mod notify;
pub mod ordering;
pub mod plans;
pub mod store;
