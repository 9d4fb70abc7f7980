pub mod discovery;
pub mod health;
