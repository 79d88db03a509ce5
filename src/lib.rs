//! # double-facade
//!
//! A cache-first HTTP response facade. Every request is answered either with
//! a response previously saved under its exact request target, or with a
//! single static root document (`static/index.html` by default) read fresh
//! from disk.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use double_facade::{Facade, FacadeConfig, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let facade = Arc::new(Facade::new(FacadeConfig::default()));
//!     facade.cache_save("/robots.txt", "User-agent: *\n", [("Content-Type", "text/plain")]);
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.serve(facade).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod facade;
pub mod http;
pub mod server;
pub mod sink;

pub use cache::{CacheRecord, CacheStore};
pub use config::{ConfigError, FacadeConfig};
pub use facade::{Facade, FacadeError};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
pub use sink::{PendingResponse, ResponseSink, ResponseWriter, SinkError};
