//! Serves `./static/index.html` on port 8080, with one pre-cached page.
//!
//! ```text
//! RUST_LOG=double_facade=debug cargo run --example serve
//! curl http://127.0.0.1:8080/            # root document
//! curl http://127.0.0.1:8080/hello.txt   # cached response
//! ```

use std::sync::Arc;

use double_facade::{Facade, FacadeConfig, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let facade = Arc::new(Facade::new(FacadeConfig::default()));
    facade.cache_save(
        "/hello.txt",
        "Hello, World!",
        [("Content-Type", "text/plain;charset=utf-8")],
    );

    let server = Server::bind("127.0.0.1:8080").await?;
    server.serve(facade).await?;
    Ok(())
}
