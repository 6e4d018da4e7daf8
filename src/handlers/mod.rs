// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth, then per-handler role checks)
pub mod protected;
pub mod public;
