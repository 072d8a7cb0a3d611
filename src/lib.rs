pub mod app;
pub mod check;
pub mod insights;
pub mod state;
