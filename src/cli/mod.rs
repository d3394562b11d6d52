mod migrate;
mod server;

pub use migrate::{migrate, reset, run_migrations};
pub use server::serve;
