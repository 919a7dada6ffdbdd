pub mod build;
pub mod health;
pub mod save;
pub mod status;
