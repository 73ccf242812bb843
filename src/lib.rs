pub mod appointments;
pub mod board;
pub mod cache_gate;
pub mod care;
pub mod config;
pub mod debounce;
pub mod midnight;
pub mod model;
pub mod view;

pub use board::CareBoard;
pub use care::{CareService, HttpCareClient};
