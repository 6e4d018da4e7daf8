// handlers/protected/mod.rs - Endpoints behind the JWT layer
//
// Role checks happen per handler through `Authorized<P>`.
pub mod auth;
pub mod comments;
pub mod files;
pub mod payments;
pub mod progress;
pub mod users;

mod reports;
