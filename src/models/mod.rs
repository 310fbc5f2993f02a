pub mod collab;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod messages;
pub mod ready;

pub use collab::*;
pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use messages::*;
pub use ready::*;
