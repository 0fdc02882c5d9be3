
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hostrelay::api::{create_router, ControlState};
use hostrelay::{AccessList, Listener, ListenerConfig, Protocol};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const SECRET: &str = "integration-secret";

struct ControlHandle {
    base: String,
    access: Arc<AccessList>,
    client: reqwest::Client,
}

impl ControlHandle {
    async fn spawn() -> Self {
        let access = Arc::new(AccessList::new());
        let app = create_router(ControlState::new(Arc::clone(&access), SECRET));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        Self {
            base: format!("http://{}", addr),
            access,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> (u16, String) {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }
}

#[tokio::test]
async fn self_registration_uses_peer_address() {
    let control = ControlHandle::spawn().await;

    let (status, body) = control.get(&format!("/aio?secret={}", SECRET)).await;
    assert_eq!(status, 200);
    assert_eq!(body, "DONE: 127.0.0.1\n");
    assert!(control.access.allow("127.0.0.1").await);

    let (_, body) = control.get("/list").await;
    assert_eq!(body, "127.0.0.1/32\n");
}

#[tokio::test]
async fn management_round_trip() {
    let control = ControlHandle::spawn().await;

    let (_, body) = control.get("/aio?addr=10.0.0.1").await;
    assert_eq!(body, "FAIL: No Secret\n");

    let upper = SECRET.to_uppercase();
    let (_, body) = control
        .get(&format!("/aio?secret={}&addr=10.0.0.0/8", upper))
        .await;
    assert_eq!(body, "DONE: 10.0.0.0/8\n");

    let (_, body) = control
        .get(&format!("/delete?secret={}&addr=10.9.9.9", SECRET))
        .await;
    assert_eq!(body, "DONE: Deleted 10.9.9.9\n");
    assert!(control.access.is_empty().await);

    control
        .get(&format!("/aio?secret={}&addr=192.168.1.1", SECRET))
        .await;
    let (_, body) = control.get(&format!("/purge?secret={}", SECRET)).await;
    assert_eq!(body, "DONE: Purged\n");

    let (status, _) = control.get("/nope").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn listener_drops_loopback_client_even_when_allowed() {
    let access = Arc::new(AccessList::new());
    access.add("127.0.0.1").await;

    let resolver = Arc::new(harness::StaticResolver::new());
    let listener = Arc::new(
        Listener::bind(
            ListenerConfig::new("127.0.0.1:0".parse().unwrap(), Protocol::Http),
            access,
            resolver.clone(),
        )
        .await
        .unwrap(),
    );
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Arc::clone(&listener).run());

    let mut client = TcpStream::connect(addr).await.unwrap();
    let _ = client
        .write_all(b"GET / HTTP/1.1\r\nHost: good.example\r\n\r\n")
        .await;

    let mut out = Vec::new();
    let _ = timeout(Duration::from_secs(5), client.read_to_end(&mut out))
        .await
        .expect("relay should close the connection");
    assert!(out.is_empty());

    assert_eq!(listener.stats().rejected_policy.load(Ordering::Relaxed), 1);
    assert_eq!(resolver.lookup_count(), 0);
}
