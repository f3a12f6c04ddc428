//! Real-time delivery over WebSockets
//!
//! The hub is process-wide; each socket runs its own session loop.

pub mod hub;
pub mod protocol;
pub mod session;

pub use hub::{ConnectionInfo, ConnectionManager, HubStats};
pub use protocol::{ServerMessage, NOTIFICATIONS_CHANNEL};
pub use session::SocketKind;
