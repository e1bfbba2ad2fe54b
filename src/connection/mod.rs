mod connection;
mod event;
mod manager;
mod state;

pub use connection::*;
pub use event::*;
pub use manager::*;
pub use state::ConnectionState;
