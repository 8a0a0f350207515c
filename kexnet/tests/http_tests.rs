// End-to-end tests over real sockets on 127.0.0.1.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use kexnet::{agent_router, authority_router, serve, Directory, HttpExchange};
use kextrust::session::SessionPhase;
use kextrust::{Agent, Authority, Credentials, KexError, PrincipalKeyPair, Registry};
use tokio::net::TcpListener;
use tokio::runtime::Handle;

struct Keys {
    trent: PrincipalKeyPair,
    alice: PrincipalKeyPair,
    bob: PrincipalKeyPair,
}

fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| Keys {
        trent: PrincipalKeyPair::generate(1024).unwrap(),
        alice: PrincipalKeyPair::generate(1024).unwrap(),
        bob: PrincipalKeyPair::generate(1024).unwrap(),
    })
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    (listener, format!("http://{addr}"))
}

struct Deployment {
    authority_url: String,
    alice: Arc<Agent>,
    alice_url: String,
    bob: Arc<Agent>,
    bob_url: String,
}

async fn deploy() -> Deployment {
    let k = keys();
    let registry = Registry::new([
        ("alice", k.alice.public_key().clone()),
        ("bob", k.bob.public_key().clone()),
    ]);
    let (authority_listener, authority_url) = bind().await;
    let (alice_listener, alice_url) = bind().await;
    let (bob_listener, bob_url) = bind().await;

    let authority = Arc::new(Authority::new(k.trent.clone(), registry));
    tokio::spawn(serve(authority_listener, authority_router(authority)));

    let agent = |id: &str, keys: &PrincipalKeyPair, peer: &str, peer_url: &str| {
        let directory = Directory::new(authority_url.clone()).with_peer(peer, peer_url);
        let exchange = HttpExchange::new(Handle::current(), directory).unwrap();
        Arc::new(Agent::new(
            Credentials::new(id, keys.clone(), k.trent.public_key().clone()),
            Arc::new(exchange),
        ))
    };
    let alice = agent("alice", &k.alice, "bob", &bob_url);
    let bob = agent("bob", &k.bob, "alice", &alice_url);
    tokio::spawn(serve(alice_listener, agent_router(Arc::clone(&alice))));
    tokio::spawn(serve(bob_listener, agent_router(Arc::clone(&bob))));

    Deployment {
        authority_url,
        alice,
        alice_url,
        bob,
        bob_url,
    }
}

/// Run blocking engine calls off the runtime workers.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn handshake_and_hello_over_http() {
    let d = deploy().await;

    let alice = Arc::clone(&d.alice);
    blocking(move || alice.initiate("bob")).await.unwrap();

    assert_eq!(d.alice.session_phase("bob"), Some(SessionPhase::Established));
    assert_eq!(d.bob.session_phase("alice"), Some(SessionPhase::Established));
    assert_eq!(d.alice.session_key("bob").unwrap(), d.bob.session_key("alice").unwrap());

    let alice = Arc::clone(&d.alice);
    blocking(move || alice.send("bob", b"hello")).await.unwrap();
    assert_eq!(d.bob.inbox("alice"), vec![&b"hello"[..]]);

    let bob = Arc::clone(&d.bob);
    blocking(move || bob.send("alice", b"hi")).await.unwrap();
    assert_eq!(d.alice.inbox("bob"), vec![&b"hi"[..]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn health_endpoints_answer() {
    let d = deploy().await;
    let client = reqwest::Client::new();
    for base in [&d.authority_url, &d.alice_url, &d.bob_url] {
        let resp = client.get(format!("{base}/health")).send().await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "ok");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn errors_map_to_status_codes() {
    let d = deploy().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/key-certificate", d.authority_url))
        .body(r#"{"subject":"mallory"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert!(resp.text().await.unwrap().contains("mallory"));

    let resp = client
        .post(format!("{}/key-certificate", d.authority_url))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = client
        .post(format!("{}/message", d.bob_url))
        .body(r#"{"sender":"alice","sealed":{"iv":"AAAAAAAAAAAAAAAAAAAAAA==","ciphertext":"AAAAAAAAAAAAAAAAAAAAAA=="}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // Agents do not serve authority routes.
    let resp = client
        .post(format!("{}/session-certificate", d.alice_url))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_peer_reports_transport_error() {
    let d = deploy().await;
    let alice = Arc::clone(&d.alice);
    let err = blocking(move || alice.initiate("carol")).await.unwrap_err();
    assert!(matches!(err, KexError::TransportError(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn silent_peer_times_out() {
    let k = keys();
    let registry = Registry::new([
        ("alice", k.alice.public_key().clone()),
        ("bob", k.bob.public_key().clone()),
    ]);
    let (authority_listener, authority_url) = bind().await;
    tokio::spawn(serve(
        authority_listener,
        authority_router(Arc::new(Authority::new(k.trent.clone(), registry))),
    ));

    // Accepts connections into the backlog and never answers.
    let (_silent, silent_url) = bind().await;

    let directory = Directory::new(authority_url).with_peer("bob", silent_url);
    let exchange = HttpExchange::new(Handle::current(), directory)
        .unwrap()
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(300));
    let alice = Arc::new(Agent::new(
        Credentials::new("alice", k.alice.clone(), k.trent.public_key().clone()),
        Arc::new(exchange),
    ));

    let err = blocking(move || alice.initiate("bob")).await.unwrap_err();
    assert!(matches!(err, KexError::TransportError(ref m) if m.contains("timed out")));
}
