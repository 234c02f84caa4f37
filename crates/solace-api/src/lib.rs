pub mod auth;
pub mod chats;
pub mod error;
pub mod middleware;
pub mod responder;
pub mod router;
pub mod service;
pub mod state;

pub use error::ApiError;
pub use router::router;
pub use state::{AppState, AppStateInner};
