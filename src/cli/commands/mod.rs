pub mod admin;
pub mod drive;
pub mod report;
