mod events;
mod publisher;

pub use events::*;
pub use publisher::*;
