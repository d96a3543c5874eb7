pub mod admin;
pub mod models;
pub mod proxy;
pub mod system;
