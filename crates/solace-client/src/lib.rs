//! Client-side mirror of a user's chats.
//!
//! [`SessionController`] is the root object a UI holds: it owns the signed-in
//! session and the [`ChatStore`], and talks to the server through a
//! [`ChatBackend`]. Signing in builds a fresh store; signing out drops it.

pub mod backend;
pub mod http;
pub mod session;
pub mod store;

pub use backend::{ChatBackend, ClientError};
pub use http::HttpBackend;
pub use session::{AuthSession, SessionController};
pub use store::{ChatStore, Delivery, LocalMessage, Thread};
