//! API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, TLS detection, graceful shutdown)
//!     → auth.rs (Bearer password, /api/* only)
//!     → handlers.rs (health, recent node events)
//! ```

pub mod auth;
pub mod handlers;
pub mod server;
pub mod tls;

pub use server::{build_router, ApiServer, AppState};
