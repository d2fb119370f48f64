pub mod client;

pub mod models {
    pub mod profile;
    pub mod verification;
}

pub mod dtos {
    pub mod verification;
}
