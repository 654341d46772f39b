//! End-to-end wire-protocol tests: a real [`FilteringProxy`] listener, a
//! real loopback "upstream" to tunnel into, and raw [`TcpStream`] clients
//! speaking the proxy's `CONNECT`/plain-HTTP surface exactly as an external
//! caller would: an allowed `CONNECT` gets `200`, a denied one gets `403`
//! with the fixed denial phrase, and an `updateConfig` takes effect for the
//! very next decision on the same port.

use std::sync::Arc;

use sandbox_network_proxy::FilteringProxy;
use sandbox_network_proxy::ProxyState;
use sandbox_policy::HostPattern;
use sandbox_policy::HostPatternSet;
use sandbox_policy::NetworkRestriction;
use sandbox_policy::Policy;
use sandbox_policy::ReadRestriction;
use sandbox_policy::ViolationStore;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

fn policy_allowing(hosts: &[&str]) -> Policy {
    Policy::new(
        ReadRestriction::DenyOnly { deny: Vec::new() },
        None,
        NetworkRestriction {
            allowed_hosts: Some(HostPatternSet::new(
                hosts.iter().map(|h| HostPattern::new(*h)),
            )),
            denied_hosts: None,
        },
        false,
    )
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.expect("read response head");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn connect_to_allowed_host_returns_200_and_tunnels_bytes() {
    let upstream = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind upstream");
    let upstream_port = upstream.local_addr().expect("upstream addr").port();
    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.expect("accept upstream");
        let mut buf = [0u8; 64];
        let n = socket.read(&mut buf).await.expect("read tunnel bytes");
        socket.write_all(&buf[..n]).await.expect("echo tunnel bytes");
    });

    let state = Arc::new(ProxyState::new(
        policy_allowing(&["127.0.0.1"]),
        Arc::new(ViolationStore::default()),
    ));
    let proxy = FilteringProxy::bind(state).await.expect("bind proxy");

    let mut client = TcpStream::connect(("127.0.0.1", proxy.port()))
        .await
        .expect("connect to proxy");
    client
        .write_all(format!("CONNECT 127.0.0.1:{upstream_port} HTTP/1.1\r\n\r\n").as_bytes())
        .await
        .expect("send CONNECT");

    let response = read_head(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 200 Connection Established"));

    client.write_all(b"ping").await.expect("write tunneled payload");
    let mut echoed = [0u8; 4];
    client.read_exact(&mut echoed).await.expect("read echo");
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn connect_to_denied_host_returns_403_with_allowlist_phrase() {
    let state = Arc::new(ProxyState::new(
        policy_allowing(&["example.com"]),
        Arc::new(ViolationStore::default()),
    ));
    let proxy = FilteringProxy::bind(state).await.expect("bind proxy");

    let mut client = TcpStream::connect(("127.0.0.1", proxy.port()))
        .await
        .expect("connect to proxy");
    client
        .write_all(b"CONNECT other.com:443 HTTP/1.1\r\n\r\n")
        .await
        .expect("send CONNECT");

    let response = read_head(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 403 Forbidden"));
    assert!(response.contains("blocked by network allowlist"));
}

#[tokio::test]
async fn update_config_opens_access_on_the_same_proxy_port() {
    let upstream = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind upstream");
    let upstream_port = upstream.local_addr().expect("upstream addr").port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = upstream.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1];
                let _ = socket.read(&mut buf).await;
            });
        }
    });

    let state = Arc::new(ProxyState::new(
        policy_allowing(&[]),
        Arc::new(ViolationStore::default()),
    ));
    let proxy = FilteringProxy::bind(Arc::clone(&state)).await.expect("bind proxy");

    let mut first = TcpStream::connect(("127.0.0.1", proxy.port()))
        .await
        .expect("connect to proxy");
    first
        .write_all(format!("CONNECT 127.0.0.1:{upstream_port} HTTP/1.1\r\n\r\n").as_bytes())
        .await
        .expect("send CONNECT");
    assert!(read_head(&mut first).await.starts_with("HTTP/1.1 403"));

    state.update_policy(policy_allowing(&["127.0.0.1"]));

    let mut second = TcpStream::connect(("127.0.0.1", proxy.port()))
        .await
        .expect("connect to proxy again");
    second
        .write_all(format!("CONNECT 127.0.0.1:{upstream_port} HTTP/1.1\r\n\r\n").as_bytes())
        .await
        .expect("send CONNECT after update");
    assert!(read_head(&mut second).await.starts_with("HTTP/1.1 200"));
}

#[tokio::test]
async fn plain_http_request_forwards_body_to_upstream() {
    let upstream = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind upstream");
    let upstream_port = upstream.local_addr().expect("upstream addr").port();
    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.expect("accept upstream");
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.expect("read forwarded request");
        let received = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(received.contains("POST /submit HTTP/1.1"));
        assert!(received.ends_with("name=value"));
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
            .await
            .expect("write upstream response");
    });

    let state = Arc::new(ProxyState::new(
        policy_allowing(&["127.0.0.1"]),
        Arc::new(ViolationStore::default()),
    ));
    let proxy = FilteringProxy::bind(state).await.expect("bind proxy");

    let mut client = TcpStream::connect(("127.0.0.1", proxy.port()))
        .await
        .expect("connect to proxy");
    let request = format!(
        "POST http://127.0.0.1:{upstream_port}/submit HTTP/1.1\r\nHost: 127.0.0.1:{upstream_port}\r\nContent-Length: 10\r\n\r\nname=value"
    );
    client
        .write_all(request.as_bytes())
        .await
        .expect("send request with body in the same write");

    let response = read_head(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
}
