use std::net::SocketAddr;
use std::sync::Arc;

use double_facade::sink::ResponseSink;
use double_facade::{Facade, FacadeConfig, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const ROOT_DOCUMENT: &str = "<html>OK</html>";

struct Reply {
    head: String,
    body: Vec<u8>,
}

impl Reply {
    fn status_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(": ")?;
            key.eq_ignore_ascii_case(name).then_some(value)
        })
    }
}

fn site() -> (tempfile::TempDir, FacadeConfig) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), ROOT_DOCUMENT).unwrap();
    let config = FacadeConfig::default().with_static_root(dir.path());
    (dir, config)
}

async fn start(facade: Arc<Facade>) -> (SocketAddr, JoinHandle<()>) {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let handle = tokio::spawn(async move {
        let _ = server.serve(facade).await;
    });
    (addr, handle)
}

async fn get(addr: SocketAddr, target: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");
    Reply {
        head: String::from_utf8(raw[..split].to_vec()).unwrap(),
        body: raw[split + 4..].to_vec(),
    }
}

#[tokio::test]
async fn root_request_returns_root_document() {
    let (_dir, config) = site();
    let (addr, server) = start(Arc::new(Facade::new(config))).await;

    let reply = get(addr, "/").await;

    assert_eq!(reply.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("text/html"));
    assert_eq!(reply.body, ROOT_DOCUMENT.as_bytes());
    server.abort();
}

#[tokio::test]
async fn uncached_path_returns_root_document() {
    let (_dir, config) = site();
    let (addr, server) = start(Arc::new(Facade::new(config))).await;

    let reply = get(addr, "/non-existing-document.html").await;

    assert_eq!(reply.body, ROOT_DOCUMENT.as_bytes());
    assert_eq!(reply.header("Content-Length"), Some("15"));
    server.abort();
}

#[tokio::test]
async fn saved_document_is_served_on_hit() {
    let (_dir, config) = site();
    let facade = Arc::new(Facade::new(config));
    let (addr, server) = start(Arc::clone(&facade)).await;

    facade.cache_save(
        "/missing.html",
        "Hello, World!",
        [("Content-Type", "text/plain;charset=utf-8")],
    );
    let reply = get(addr, "/missing.html").await;

    assert_eq!(reply.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("text/plain;charset=utf-8"));
    assert_eq!(reply.body, b"Hello, World!");
    server.abort();
}

#[tokio::test]
async fn missing_root_document_is_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let config = FacadeConfig::default().with_static_root(dir.path());
    let (addr, server) = start(Arc::new(Facade::new(config))).await;

    let reply = get(addr, "/").await;

    assert_eq!(reply.status_line(), "HTTP/1.1 500 Internal Server Error");
    assert!(reply.body.is_empty());
    server.abort();
}

#[tokio::test]
async fn concurrent_misses_each_get_the_full_document() {
    let dir = tempfile::tempdir().unwrap();
    let document: String = (0..20_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    std::fs::write(dir.path().join("index.html"), &document).unwrap();
    let config = FacadeConfig::default().with_static_root(dir.path());
    let (addr, server) = start(Arc::new(Facade::new(config))).await;

    let requests: Vec<_> = (0..16)
        .map(|i| tokio::spawn(async move { get(addr, &format!("/page/{i}")).await }))
        .collect();

    for request in requests {
        let reply = request.await.unwrap();
        assert_eq!(reply.body, document.as_bytes());
    }
    server.abort();
}

#[tokio::test]
async fn keep_alive_connection_serves_several_requests() {
    let (_dir, config) = site();
    let facade = Arc::new(Facade::new(config));
    facade.cache_save("/a", "cached", [("Content-Type", "text/plain")]);
    let (addr, server) = start(facade).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert_eq!(raw.matches("HTTP/1.1 200 OK").count(), 2);
    assert!(raw.contains("\r\n\r\ncached"));
    assert!(raw.ends_with(ROOT_DOCUMENT));
    server.abort();
}

#[tokio::test]
async fn malformed_request_is_a_400() {
    let (_dir, config) = site();
    let (addr, server) = start(Arc::new(Facade::new(config))).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"NOT HTTP AT ALL\r\n\r\n").await.unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    server.abort();
}

#[tokio::test]
async fn handler_that_never_ends_gets_a_500() {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let handle = tokio::spawn(async move {
        let _ = server
            .run(|_req, mut res| async move {
                let _ = res.write(b"partial");
                drop(res);
            })
            .await;
    });

    let reply = get(addr, "/").await;

    assert_eq!(reply.status_line(), "HTTP/1.1 500 Internal Server Error");
    assert!(reply.body.is_empty());
    handle.abort();
}

#[tokio::test]
async fn oversized_content_length_is_a_413() {
    let (_dir, config) = site();
    let (addr, server) = start(Arc::new(Facade::new(config))).await;

    for declared in ["18446744073709551615", "16777216"] {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET / HTTP/1.1\r\nHost: x\r\nContent-Length: {declared}\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(
            raw.starts_with("HTTP/1.1 413 Payload Too Large\r\n"),
            "{declared}: {raw:?}"
        );
    }

    // The server keeps accepting connections afterwards.
    let reply = get(addr, "/").await;
    assert_eq!(reply.body, ROOT_DOCUMENT.as_bytes());
    server.abort();
}
