mod packet;
mod command;
mod control;
pub mod constants;

pub use packet::*;
pub use command::*;
pub use control::*;
pub use constants::*;
