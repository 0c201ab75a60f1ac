//! # tollgate
//!
//! A minimal HTTP gateway for services behind a reverse proxy: one public
//! route group, one private route group, and a bearer API key gate in front
//! of the private one.
//!
//! ## The contract
//!
//! The proxy in front terminates TLS and rate-limits. tollgate owns what is
//! left:
//!
//! - A fixed middleware pipeline: correlation id, optional client-address
//!   resolution, request logging, panic recovery, a request deadline,
//!   content-type and no-cache hardening
//! - A [`BearerAuth`](middleware::BearerAuth) gate checking
//!   `Authorization: Bearer <token>` against an immutable
//!   [`CredentialRegistry`](middleware::CredentialRegistry)
//! - Radix-tree routing via [`matchit`], route groups with their own middleware
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tollgate::middleware::CredentialRegistry;
//! use tollgate::{PipelineConfig, Server, routes};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tollgate::Error> {
//!     let registry = CredentialRegistry::new([("gae_ffd7bef1", "admin")])?;
//!     let app = routes::app(registry, &PipelineConfig::default());
//!
//!     Server::bind(([0, 0, 0, 0], 8080).into()).serve(app).await
//! }
//! ```
//!
//! ```text
//! curl -H 'Authorization: Bearer gae_ffd7bef1' http://localhost:8080/api/v1/private/test
//! {"authorized": true}
//! ```

mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod middleware;
pub mod routes;

pub use config::{Config, LogFormat, PipelineConfig};
pub use context::{Context, Principal, RequestId};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Group, Router, Service};
pub use server::Server;

pub use http::{Method, StatusCode};
