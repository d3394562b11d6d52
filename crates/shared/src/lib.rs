mod command;
mod date;
pub mod dispatch;
pub mod form;

pub use command::*;
pub use date::*;
