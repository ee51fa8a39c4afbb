pub mod detect;
pub mod embed;
pub mod health;
