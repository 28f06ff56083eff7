//! End-to-end PUSH/PULL scenarios through the public facade.

use pipemq::zmq::prelude::*;
use pipemq::Error;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn context() -> Context {
    pipemq::dev_tracing::init_tracing();
    Context::new().with_options(
        SocketOptions::default()
            .with_recv_timeout(Duration::from_secs(2))
            .with_reconnect_ivl(Duration::from_millis(20)),
    )
}

fn parts(items: &[&'static str]) -> Vec<Bytes> {
    items.iter().map(|s| Bytes::from_static(s.as_bytes())).collect()
}

#[compio::test]
async fn test_multipart_push_pull_over_tcp() {
    let ctx = context();
    let pull = ctx.new_socket(SocketType::Pull, "NULL", &[]).unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();
    assert!(address.starts_with("tcp://127.0.0.1:"));
    assert_ne!(address, "tcp://127.0.0.1:0");

    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    push.connect(&address).await.unwrap();
    assert_eq!(push.last_endpoint(), Some(address.clone()));

    push.send(parts(&["a", "b"])).await.unwrap();
    assert_eq!(pull.recv().await.unwrap(), parts(&["a", "b"]));

    push.close().await.unwrap();
    pull.close().await.unwrap();
}

#[compio::test]
async fn test_bound_push_fans_out_to_connected_pullers() {
    let ctx = context();
    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    let address = push.bind("tcp://127.0.0.1:0").await.unwrap();

    let mut pullers = Vec::new();
    for _ in 0..3 {
        let pull = ctx.new_socket(SocketType::Pull, "NULL", &[]).unwrap();
        pull.connect(&address).await.unwrap();
        pullers.push(pull);
    }

    // inbound peers register once their handshake finishes on the bind side
    let deadline = Instant::now() + Duration::from_secs(2);
    while push.peer_count() < 3 {
        assert!(Instant::now() < deadline, "peers never became ready");
        compio::time::sleep(Duration::from_millis(10)).await;
    }

    for n in 0..6 {
        push.send(vec![Bytes::from(format!("job-{n}"))]).await.unwrap();
    }
    for pull in &pullers {
        // two each: consecutive sends never pick the same peer twice in a row
        assert_eq!(pull.recv().await.unwrap().len(), 1);
        assert_eq!(pull.recv().await.unwrap().len(), 1);
    }

    push.close().await.unwrap();
    for pull in pullers {
        pull.close().await.unwrap();
    }
}

#[compio::test]
async fn test_send_with_no_peers_does_not_block() {
    let ctx = context();
    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    let started = Instant::now();
    assert!(matches!(push.send(parts(&["x"])).await, Err(Error::NoPeers)));
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[compio::test]
async fn test_wrong_direction_is_rejected() {
    let ctx = context();
    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    let pull = ctx.new_socket(SocketType::Pull, "NULL", &[]).unwrap();
    assert!(matches!(push.recv().await, Err(Error::OperationNotPermitted)));
    assert!(matches!(pull.send(parts(&["x"])).await, Err(Error::OperationNotPermitted)));
}

#[compio::test]
async fn test_address_errors() {
    let ctx = context();
    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();

    assert!(push.connect("udp://127.0.0.1:5555").await.unwrap_err().is_fatal());
    assert!(push.connect("tcp://not an address").await.unwrap_err().is_fatal());
    assert!(matches!(
        push.disconnect("tcp://127.0.0.1:5555").await,
        Err(Error::NeverConnected(_))
    ));
    assert!(matches!(
        push.unbind("tcp://127.0.0.1:5555").await,
        Err(Error::NeverBound(_))
    ));
}

#[compio::test]
async fn test_close_cancels_pending_recv() {
    let ctx = context();
    let pull = Rc::new(ctx.new_socket(SocketType::Pull, "NULL", &[]).unwrap());
    pull.bind("tcp://127.0.0.1:0").await.unwrap();

    let closer = pull.clone();
    compio::runtime::spawn(async move {
        compio::time::sleep(Duration::from_millis(50)).await;
        closer.close().await.unwrap();
    })
    .detach();

    let started = Instant::now();
    assert!(matches!(pull.recv().await, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[compio::test]
async fn test_monitor_sees_lifecycle() {
    let (bus, monitor) = create_monitor();
    let ctx = context().with_events(Rc::new(bus));

    let pull = ctx.new_socket(SocketType::Pull, "NULL", &[]).unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();
    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    push.connect(&address).await.unwrap();

    push.send(parts(&["ping"])).await.unwrap();
    pull.recv().await.unwrap();
    push.close().await.unwrap();
    pull.close().await.unwrap();

    let kinds: Vec<EventKind> = monitor.try_iter().map(|e| e.kind).collect();
    for expected in [
        EventKind::Connected,
        EventKind::Accepted,
        EventKind::Ready,
        EventKind::Disconnected,
    ] {
        assert!(kinds.contains(&expected), "missing {expected} in {kinds:?}");
    }
}

#[cfg(unix)]
#[compio::test]
async fn test_push_pull_over_ipc() {
    let ctx = context();
    let path = std::env::temp_dir().join(format!("pipemq-facade-{}.sock", std::process::id()));
    let address = format!("ipc://{}", path.display());

    let pull = ctx.new_socket(SocketType::Pull, "NULL", &[]).unwrap();
    pull.bind(&address).await.unwrap();
    let push = ctx.new_socket(SocketType::Push, "NULL", &[]).unwrap();
    push.connect(&address).await.unwrap();

    push.send(parts(&["local"])).await.unwrap();
    assert_eq!(pull.recv().await.unwrap(), parts(&["local"]));

    push.close().await.unwrap();
    pull.close().await.unwrap();
    let _ = std::fs::remove_file(path);
}
