//! PLAIN authentication between PUSH and PULL sockets.

use pipemq::zmq::prelude::*;
use pipemq::zmq::{PlainAuthenticator, StaticPlainAuthenticator};
use pipemq::Error;
use std::rc::Rc;
use std::time::Duration;

fn server_options() -> Vec<MechanismOption> {
    let users: Rc<dyn PlainAuthenticator> =
        Rc::new(StaticPlainAuthenticator::new().with_user("admin", "secret"));
    vec![
        MechanismOption::Server(true),
        MechanismOption::PlainAuthenticator(users),
    ]
}

fn context(bus: Option<flume::Sender<SocketEvent>>) -> Context {
    let ctx = Context::new().with_options(
        SocketOptions::default()
            .with_recv_timeout(Duration::from_secs(2))
            .with_reconnect_ivl(Duration::from_millis(50)),
    );
    match bus {
        Some(bus) => ctx.with_events(Rc::new(bus)),
        None => ctx,
    }
}

#[compio::test]
async fn test_valid_credentials_deliver() {
    let ctx = context(None);
    let pull = ctx.new_socket(SocketType::Pull, "PLAIN", &server_options()).unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();

    let creds = MechanismOption::PlainCredentials(PlainCredentials::new("admin", "secret"));
    let push = ctx.new_socket(SocketType::Push, "PLAIN", &[creds]).unwrap();
    push.connect(&address).await.unwrap();
    assert_eq!(push.peer_count(), 1);

    push.send(vec![Bytes::from("authorized")]).await.unwrap();
    assert_eq!(pull.recv().await.unwrap(), vec![Bytes::from("authorized")]);

    push.close().await.unwrap();
    pull.close().await.unwrap();
}

#[compio::test]
async fn test_wrong_password_is_rejected() {
    let (bus, monitor) = create_monitor();
    let ctx = context(Some(bus));
    let pull = ctx.new_socket(SocketType::Pull, "PLAIN", &server_options()).unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();

    let creds = MechanismOption::PlainCredentials(PlainCredentials::new("admin", "guess"));
    let push = ctx.new_socket(SocketType::Push, "PLAIN", &[creds]).unwrap();
    // handshake failures are retried in the background, not returned
    push.connect(&address).await.unwrap();
    assert_eq!(push.peer_count(), 0);
    assert!(matches!(push.send(vec![Bytes::from("x")]).await, Err(Error::NoPeers)));

    push.close().await.unwrap();
    pull.close().await.unwrap();
    assert!(monitor
        .try_iter()
        .any(|e| e.kind == EventKind::FailedHandshake));
}

#[compio::test]
async fn test_mechanism_mismatch_fails_greeting() {
    let (bus, monitor) = create_monitor();
    let ctx = context(Some(bus));
    let pull = ctx.new_socket(SocketType::Pull, "PLAIN", &server_options()).unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();

    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    push.connect(&address).await.unwrap();
    assert_eq!(push.peer_count(), 0);

    push.close().await.unwrap();
    pull.close().await.unwrap();
    assert!(monitor
        .try_iter()
        .any(|e| e.kind == EventKind::FailedGreeting));
}

#[test]
fn test_invalid_mechanism_options() {
    let ctx = Context::new();
    assert!(matches!(
        ctx.new_socket(SocketType::Push, "PLAIN", &[]),
        Err(Error::InvalidOption(_))
    ));
    assert!(matches!(
        ctx.new_socket(SocketType::Push, "NULL", &[MechanismOption::Server(true)]),
        Err(Error::InvalidOption(_))
    ));
    assert!(matches!(
        ctx.new_socket(SocketType::Push, "CURVE", &[]),
        Err(Error::InvalidOption(_))
    ));
    assert!(matches!(
        ctx.new_socket(SocketType::Push, "GSSAPI", &[]),
        Err(Error::MechanismNotFound(_))
    ));
}
