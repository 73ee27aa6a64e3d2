use std::{net::SocketAddr, sync::Arc};

use miroslava::{Error, Miroslava, MiroslavaServer, ServerHandle, ViewArgs};
use pretty_assertions::assert_eq;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
};

async fn start(app: Miroslava) -> (SocketAddr, ServerHandle) {
    let server = MiroslavaServer::bind(Arc::new(app), "127.0.0.1", 0)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    tokio::spawn(server.serve());
    (addr, handle)
}

async fn app_server() -> (SocketAddr, ServerHandle) {
    let mut app = Miroslava::new("server_tests");
    app.route("/", |_: ViewArgs| async move { Ok::<_, Error>("<h1>Shinzou wo sasageyo</h1>") })
        .unwrap();
    app.post("/echo", |args: ViewArgs| async move {
        Ok::<_, Error>(args.request().data().clone())
    })
    .unwrap();
    app.route("/client", |args: ViewArgs| async move {
        Ok::<_, Error>(args.request().remote_addr().unwrap_or_default().to_string())
    })
    .unwrap();
    start(app).await
}

async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[test_log::test(tokio::test)]
async fn serves_a_view() {
    let (addr, handle) = app_server().await;

    let response = exchange(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert_eq!(
        response,
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: 28\r\n\
         \r\n\
         <h1>Shinzou wo sasageyo</h1>"
    );

    handle.stop();
}

#[test_log::test(tokio::test)]
async fn head_omits_body() {
    let (addr, handle) = app_server().await;

    let response = exchange(addr, b"HEAD / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("Content-Length: 28\r\n\r\n"));

    handle.stop();
}

#[test_log::test(tokio::test)]
async fn reads_body_split_across_writes() {
    let (addr, handle) = app_server().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello")
        .await
        .unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    stream.write_all(b" titan").await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.ends_with("\r\n\r\nhello titan"), "{response}");

    handle.stop();
}

#[test_log::test(tokio::test)]
async fn remote_address_is_the_peer() {
    let (addr, handle) = app_server().await;

    let response = exchange(addr, b"GET /client HTTP/1.1\r\n\r\n").await;
    assert!(response.ends_with("\r\n\r\n127.0.0.1"), "{response}");

    handle.stop();
}

#[test_log::test(tokio::test)]
async fn rejects_malformed_requests() {
    let (addr, handle) = app_server().await;

    let response = exchange(addr, b"POST /echo HTTP/1.1\r\nContent-Length: lots\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");

    let response = exchange(addr, b"BREW /pot HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 501 Not Implemented\r\n"), "{response}");

    let mut huge = b"GET / HTTP/1.1\r\nX-Padding: ".to_vec();
    huge.resize(64 * 1024 + 1, b'a');
    let response = exchange(addr, &huge).await;
    assert!(
        response.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"),
        "{response}"
    );

    handle.stop();
}

#[test_log::test(tokio::test)]
async fn unknown_paths_are_not_found() {
    let (addr, handle) = app_server().await;

    let response = exchange(addr, b"GET /walls/maria HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.ends_with("Not Found"));

    handle.stop();
}

#[test_log::test(tokio::test)]
async fn stopped_server_refuses_new_connections() {
    let (addr, handle) = app_server().await;
    handle.stop();
    assert!(handle.is_stopped());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[test_log::test(tokio::test)]
async fn binding_a_port_in_use_fails() {
    let (addr, handle) = app_server().await;

    let result =
        MiroslavaServer::bind(Arc::new(Miroslava::new("second")), "127.0.0.1", addr.port()).await;
    assert!(matches!(result, Err(Error::IO(_))), "{result:?}");

    handle.stop();
}
