pub mod database;
pub mod providers;
