pub mod client;
pub mod controller;
pub mod session;

pub mod dtos {
    pub mod auth;
}
