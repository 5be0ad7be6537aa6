pub mod decisions;
pub mod fallback;
pub mod health;
pub mod learning;
