//! HTTP surface.
//!
//! JSON endpoints are nested under `/api/`, protected by a middleware
//! stack: Rate Limit → Auth → Handler. Stored attachments are served from
//! `/files/` and realtime push rides a ticket-authenticated WebSocket at
//! `/ws/connect`.
//!
//! The router is composable; [`api_router`] returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;
pub mod websocket;

pub use error::ApiError;
pub use router::api_router;
pub use types::ApiContext;
