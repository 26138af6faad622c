pub mod app;
pub mod auth;
pub mod comment;
pub mod errors;
pub mod fixture;
pub mod github;
pub mod logging;
pub mod thread;
pub mod ui;

#[cfg(test)]
mod tests;
