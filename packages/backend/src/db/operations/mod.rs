pub mod attempts;
pub mod iep;
pub mod sessions;
pub mod students;
pub mod tasks;
pub mod users;
