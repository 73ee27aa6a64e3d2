//! Development server.
//!
//! A plain HTTP/1.1 server spawning one task per connection. Every
//! connection carries a single request and is closed once the response is
//! written.

use std::{net::SocketAddr, sync::Arc};

use bytes::{Bytes, BytesMut};
use miroslava_http_models::StatusCode;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;

use crate::{
    Error, Miroslava,
    config::Config,
    environ::Environ,
    exceptions::HttpException,
    request::Request,
    response::Response,
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9001;

const READ_CHUNK_SIZE: usize = 1024;
const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub host: Option<String>,
    /// `0` lets the OS pick a free port.
    pub port: Option<u16>,
    pub debug: Option<bool>,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }
}

/// Stops a running [`MiroslavaServer`].
#[derive(Debug, Clone)]
pub struct ServerHandle {
    token: CancellationToken,
}

impl ServerHandle {
    /// Stop accepting connections. Requests in flight still complete.
    pub fn stop(&self) {
        log::debug!("Stopping server");
        self.token.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
pub struct MiroslavaServer {
    app: Arc<Miroslava>,
    listener: TcpListener,
    token: CancellationToken,
}

impl MiroslavaServer {
    /// # Errors
    ///
    /// * If the address can't be bound
    pub async fn bind(app: Arc<Miroslava>, host: &str, port: u16) -> Result<Self, Error> {
        let listener = TcpListener::bind((host, port))
            .await
            .inspect_err(|e| log::error!("Couldn't bind to {host}:{port} due to {e}"))?;

        Ok(Self {
            app,
            listener,
            token: CancellationToken::new(),
        })
    }

    /// # Errors
    ///
    /// * If the socket has no local address
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            token: self.token.clone(),
        }
    }

    /// Accept connections until the server is stopped.
    ///
    /// # Errors
    ///
    /// * If the socket has no local address
    pub async fn serve(self) -> Result<(), Error> {
        let local_addr = self.local_addr()?;

        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                () = self.token.cancelled() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    log::trace!("Accepted connection from {peer}");
                    let app = self.app.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(app, stream, local_addr, peer).await {
                            log::debug!("Connection from {peer} failed: {e}");
                        }
                    });
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {e}");
                }
            }
        }

        log::debug!("Server on {local_addr} stopped");

        Ok(())
    }
}

impl Miroslava {
    /// Serve the app until Ctrl+C.
    ///
    /// The host falls back to the host of `SERVER_NAME`, then `127.0.0.1`.
    /// The port falls back to the port of `SERVER_NAME`, then `9001`.
    ///
    /// # Errors
    ///
    /// * If the address can't be bound
    pub async fn run(mut self, options: RunOptions) -> Result<(), Error> {
        if let Some(debug) = options.debug {
            self.set_debug(debug);
        }

        let (host, port) = resolve_address(self.config(), &options);

        let app = Arc::new(self);
        let server = MiroslavaServer::bind(app.clone(), &host, port).await?;
        let addr = server.local_addr()?;

        log::info!("* Serving Miroslava app '{}'", app.name());
        log::info!("* Debug mode: {}", if app.debug() { "on" } else { "off" });
        log::info!("* Running on http://{addr}/ (Press CTRL+C to quit)");

        let handle = server.handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for ctrl-c: {e}");
                return;
            }
            log::debug!("Received ctrl-c");
            handle.stop();
        });

        server.serve().await
    }
}

/// Host and port to bind: the run options, then `SERVER_NAME`, then the
/// defaults.
fn resolve_address(config: &Config, options: &RunOptions) -> (String, u16) {
    let (server_host, server_port) = config.server_name_parts().unwrap_or_default();
    let host = options
        .host
        .clone()
        .or_else(|| server_host.map(ToString::to_string))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = options.port.or(server_port).unwrap_or(DEFAULT_PORT);
    (host, port)
}

enum Head {
    Complete { head: Bytes, rest: BytesMut },
    Closed,
    TooLarge,
}

/// Read until the blank line ending the header block.
async fn read_head(stream: &mut TcpStream) -> std::io::Result<Head> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut searched = 0;

    loop {
        if let Some(end) = find_blank_line(&buf[searched..]).map(|x| x + searched) {
            let rest = buf.split_off(end + 4);
            buf.truncate(end);
            return Ok(Head::Complete {
                head: buf.freeze(),
                rest,
            });
        }
        if buf.len() > MAX_HEAD_SIZE {
            return Ok(Head::TooLarge);
        }
        searched = buf.len().saturating_sub(3);

        let mut chunk = [0_u8; READ_CHUNK_SIZE];
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(Head::Closed);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|x| x == b"\r\n\r\n")
}

async fn read_body(
    stream: &mut TcpStream,
    mut body: BytesMut,
    length: usize,
) -> std::io::Result<Bytes> {
    let mut chunk = [0_u8; READ_CHUNK_SIZE];
    while body.len() < length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            log::debug!("Connection closed after {} of {length} body bytes", body.len());
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(length);
    Ok(body.freeze())
}

async fn handle_client(
    app: Arc<Miroslava>,
    mut stream: TcpStream,
    local_addr: SocketAddr,
    peer: SocketAddr,
) -> Result<(), Error> {
    let (head, rest) = match read_head(&mut stream).await? {
        Head::Complete { head, rest } => (head, rest),
        Head::Closed => {
            log::trace!("Connection from {peer} closed before a request was read");
            return Ok(());
        }
        Head::TooLarge => {
            let response = HttpException::new(StatusCode::RequestHeaderFieldsTooLarge).to_response();
            log_request(peer, "-", &response);
            return send_response(&mut stream, &response, false).await;
        }
    };

    let mut environ = Environ::parse_head(&head);
    environ.set_server(local_addr.ip().to_string(), local_addr.port());
    environ.set_remote_addr(peer.ip().to_string());
    let request_line = format!(
        "{} {} {}",
        environ.method(),
        environ.path(),
        environ.protocol()
    );

    let length = match environ.content_length() {
        Ok(x) => x.unwrap_or(0),
        Err(e) => {
            log::debug!("Invalid Content-Length from {peer}: {e}");
            let response = HttpException::new(StatusCode::BadRequest)
                .with_description("Invalid Content-Length")
                .to_response();
            log_request(peer, &request_line, &response);
            return send_response(&mut stream, &response, false).await;
        }
    };
    environ.set_body(read_body(&mut stream, rest, length).await?);

    let request = match Request::new(environ) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("Rejecting request from {peer}: {e}");
            let response = HttpException::new(StatusCode::NotImplemented).to_response();
            log_request(peer, &request_line, &response);
            return send_response(&mut stream, &response, false).await;
        }
    };
    let head_only = request.method() == miroslava_http_models::Method::Head;

    let response = Miroslava::full_dispatch(&app, request).await;
    log_request(peer, &request_line, &response);

    send_response(&mut stream, &response, head_only).await
}

/// Header text as Latin-1, with characters outside of it replaced by `?`.
fn latin1(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars().map(|x| u8::try_from(u32::from(x)).unwrap_or(b'?'))
}

fn serialize_head(response: &Response) -> Vec<u8> {
    let mut head = Vec::with_capacity(256);
    head.extend(latin1(&format!("HTTP/1.1 {}\r\n", response.status())));

    for (name, value) in response.headers().iter() {
        if name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        head.extend(latin1(&format!("{name}: {value}\r\n")));
    }

    head.extend(latin1(&format!(
        "Content-Length: {}\r\n\r\n",
        response.data().len()
    )));

    head
}

async fn send_response(
    stream: &mut TcpStream,
    response: &Response,
    head_only: bool,
) -> Result<(), Error> {
    stream.write_all(&serialize_head(response)).await?;
    if !head_only {
        stream.write_all(response.data()).await?;
    }
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

fn log_request(peer: SocketAddr, request_line: &str, response: &Response) {
    log::info!(
        "{} - - [{}] \"{request_line}\" {} -",
        peer.ip(),
        chrono::Local::now().format("%d/%b/%Y %H:%M:%S"),
        response.status_code(),
    );
}
