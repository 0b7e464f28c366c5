//! Type definitions

pub mod drop;
pub mod fleet;
pub mod messages;
pub mod route;

pub use drop::*;
pub use fleet::*;
pub use messages::*;
pub use route::*;
