mod service;
mod template;

pub use service::*;
pub use template::{Email, render};
