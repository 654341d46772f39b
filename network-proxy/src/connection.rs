//! Per-connection handling: read the leading request line (and headers, for
//! `CONNECT`), decide on the target, and either splice the connection
//! through or answer with the sandbox's fixed denial/error bodies.
//!
//! A single `read()` off the client socket commonly returns the header block
//! *and* the start of the body/tunnel stream in one shot; [`read_request_head`]
//! keeps everything past the `\r\n\r\n` terminator so it can be replayed to
//! upstream before the connection is handed to `copy_bidirectional`.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::state::Decision;
use crate::state::ProxyState;

const MAX_REQUEST_HEAD: usize = 64 * 1024;

const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";
const BLOCKED_BODY: &[u8] = b"blocked by network allowlist";

pub async fn handle_connection(mut client: TcpStream, state: Arc<ProxyState>) {
    let head = match read_request_head(&mut client).await {
        Ok(head) => head,
        Err(_) => {
            let _ = respond_plain(&mut client, 400, "Bad Request", b"malformed request").await;
            return;
        }
    };

    let Some(target) = parse_target(&head) else {
        let _ = respond_plain(&mut client, 400, "Bad Request", b"could not determine target host").await;
        return;
    };

    let decision = state.decide(&target.host, target.port, "proxy").await;
    if decision == Decision::Deny {
        let _ = respond_plain(&mut client, 403, "Forbidden", BLOCKED_BODY).await;
        return;
    }

    let upstream = match TcpStream::connect((target.host.as_str(), target.port)).await {
        Ok(stream) => stream,
        Err(_) => {
            let _ = respond_plain(&mut client, 502, "Bad Gateway", b"upstream unreachable").await;
            return;
        }
    };
    let mut upstream = upstream;

    if target.is_connect {
        if client.write_all(CONNECTION_ESTABLISHED).await.is_err() {
            return;
        }
    } else if upstream.write_all(&head.raw).await.is_err() {
        return;
    }
    // Bytes already buffered past the header terminator in the same read()
    // call belong to the body (plain HTTP) or the tunneled stream (CONNECT,
    // e.g. a pipelined TLS ClientHello) — either way they go to upstream,
    // never back to the client that sent them.
    if !head.body_prefix.is_empty() && upstream.write_all(&head.body_prefix).await.is_err() {
        return;
    }

    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
}

struct Target {
    host: String,
    port: u16,
    is_connect: bool,
}

struct RequestHead {
    raw: Vec<u8>,
    /// Bytes read past the `\r\n\r\n` terminator in the same buffer fill —
    /// the start of the body (or, for `CONNECT`, of the tunneled stream)
    /// that a naive header-only forward would otherwise drop on the floor.
    body_prefix: Vec<u8>,
    request_line: String,
    headers: Vec<(String, String)>,
}

async fn read_request_head(client: &mut TcpStream) -> Result<RequestHead, ()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if buf.len() > MAX_REQUEST_HEAD {
            return Err(());
        }
        let n = client.read(&mut chunk).await.map_err(|_| ())?;
        if n == 0 {
            return Err(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_double_crlf(&buf) {
            let head_text = String::from_utf8_lossy(&buf[..pos]).into_owned();
            let mut lines = head_text.split("\r\n");
            let request_line = lines.next().ok_or(())?.to_string();
            let mut headers = Vec::new();
            for line in lines {
                if line.is_empty() {
                    continue;
                }
                if let Some((name, value)) = line.split_once(':') {
                    headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
                }
            }
            return Ok(RequestHead {
                raw: buf[..pos + 4].to_vec(),
                body_prefix: buf[pos + 4..].to_vec(),
                request_line,
                headers,
            });
        }
    }
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_target(head: &RequestHead) -> Option<Target> {
    let mut parts = head.request_line.split_whitespace();
    let method = parts.next()?;
    let uri = parts.next()?;

    if method.eq_ignore_ascii_case("CONNECT") {
        let (host, port) = split_host_port(uri, 443)?;
        return Some(Target {
            host,
            port,
            is_connect: true,
        });
    }

    if let Some(authority) = uri
        .strip_prefix("http://")
        .or_else(|| uri.strip_prefix("https://"))
    {
        let authority = authority.split('/').next().unwrap_or(authority);
        let default_port = if uri.starts_with("https://") { 443 } else { 80 };
        let (host, port) = split_host_port(authority, default_port)?;
        return Some(Target {
            host,
            port,
            is_connect: false,
        });
    }

    let host_header = head
        .headers
        .iter()
        .find(|(name, _)| name == "host")
        .map(|(_, value)| value.as_str())?;
    let (host, port) = split_host_port(host_header, 80)?;
    Some(Target {
        host,
        port,
        is_connect: false,
    })
}

fn split_host_port(authority: &str, default_port: u16) -> Option<(String, u16)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        let port = rest
            .strip_prefix(':')
            .map(|p| p.parse().ok())
            .unwrap_or(Some(default_port))?;
        return Some((host.to_string(), port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        _ => Some((authority.to_string(), default_port)),
    }
}

async fn respond_plain(
    client: &mut TcpStream,
    status: u16,
    reason: &str,
    body: &[u8],
) -> Result<(), std::io::Error> {
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    client.write_all(header.as_bytes()).await?;
    client.write_all(body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head_from(text: &str) -> RequestHead {
        let raw = text.as_bytes().to_vec();
        let mut lines = text.split("\r\n");
        let request_line = lines.next().expect("request line").to_string();
        let mut headers = Vec::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
        RequestHead {
            raw,
            body_prefix: Vec::new(),
            request_line,
            headers,
        }
    }

    #[test]
    fn parses_connect_target() {
        let head = head_from("CONNECT example.com:443 HTTP/1.1\r\n\r\n");
        let target = parse_target(&head).expect("target");
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 443);
        assert!(target.is_connect);
    }

    #[test]
    fn parses_absolute_uri_target() {
        let head = head_from("GET http://example.com/path HTTP/1.1\r\n\r\n");
        let target = parse_target(&head).expect("target");
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 80);
        assert!(!target.is_connect);
    }

    #[test]
    fn falls_back_to_host_header() {
        let head = head_from("GET /path HTTP/1.1\r\nHost: example.com:8080\r\n\r\n");
        let target = parse_target(&head).expect("target");
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 8080);
    }

    #[test]
    fn rejects_request_with_no_host_information() {
        let head = head_from("GET /path HTTP/1.1\r\n\r\n");
        assert!(parse_target(&head).is_none());
    }

    #[tokio::test]
    async fn read_request_head_retains_bytes_past_the_terminator() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind loopback listener");
        let addr = listener.local_addr().expect("local addr");

        let body = b"name=value";
        let mut sent =
            b"POST /submit HTTP/1.1\r\nHost: example.com\r\nContent-Length: 10\r\n\r\n".to_vec();
        sent.extend_from_slice(body);

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(&sent).await.expect("write request");

        let (mut server, _peer) = listener.accept().await.expect("accept");
        let head = read_request_head(&mut server).await.expect("parses head");
        assert_eq!(head.body_prefix, body);
    }
}
