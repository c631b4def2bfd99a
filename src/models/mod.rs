pub mod files;
pub mod generations;
pub mod projects;
