pub mod controller;
pub mod export;
