pub mod core;
pub mod notices;
pub mod reports;
pub mod school;
pub mod students;
pub mod users;
