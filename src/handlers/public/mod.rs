// handlers/public/mod.rs - Endpoints reachable without a token
pub mod auth;
