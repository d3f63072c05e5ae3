use dynamo_etl::server::router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn http_get(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { axum::serve(listener, router()).await });

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n", path, addr);
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    server.abort();

    response
}

#[tokio::test]
async fn test_index_over_tcp() {
    crate::helpers::utilities::init();
    let response = http_get("/").await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{}", response);
    assert!(response.to_lowercase().contains("content-type: application/json"));
    assert!(response.ends_with("\"Hello World\""));
}

#[tokio::test]
async fn test_health_over_tcp() {
    let response = http_get("/health").await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{}", response);
    assert!(response.ends_with("{\"status\":\"ok\"}"));
}
