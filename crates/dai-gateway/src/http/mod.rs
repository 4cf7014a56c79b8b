pub mod bots;
pub mod health;
pub mod logs;
