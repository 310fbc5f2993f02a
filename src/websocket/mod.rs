pub mod handler;
pub mod hub;
pub mod msg_edit_handler;
pub mod msg_lock_handler;
pub mod msg_mention_handler;
pub mod msg_ping_handler;
pub mod msg_session_handler;

pub use handler::websocket_handler;
pub use hub::Hub;
