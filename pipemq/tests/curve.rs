//! CURVE encryption between PUSH and PULL sockets.

use pipemq::zmq::prelude::*;
use pipemq::zmq::CurvePublicKey;
use pipemq::Error;
use std::rc::Rc;
use std::time::Duration;

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

fn client_options(server: CurvePublicKey) -> Vec<MechanismOption> {
    vec![
        MechanismOption::CurveClientKeys(CurveKeyPair::generate()),
        MechanismOption::CurvePeerKey(server),
    ]
}

#[compio::test]
async fn test_encrypted_pipeline_delivers() {
    let ctx = context(None);
    let server_keys = CurveKeyPair::generate();
    let server_public = server_keys.public;
    let pull = ctx
        .new_socket(SocketType::Pull, "CURVE", &[MechanismOption::CurveServerKeys(server_keys)])
        .unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();

    let push = ctx
        .new_socket(SocketType::Push, "CURVE", &client_options(server_public))
        .unwrap();
    push.connect(&address).await.unwrap();
    assert_eq!(push.peer_count(), 1);

    for n in 0..3 {
        let msg = vec![Bytes::from("sealed"), Bytes::from(format!("{n}"))];
        push.send(msg.clone()).await.unwrap();
        assert_eq!(pull.recv().await.unwrap(), msg);
    }

    push.close().await.unwrap();
    pull.close().await.unwrap();
}

#[compio::test]
async fn test_unknown_server_key_fails_handshake() {
    let (bus, monitor) = create_monitor();
    let ctx = context(Some(bus));
    let server = MechanismOption::CurveServerKeys(CurveKeyPair::generate());
    let pull = ctx.new_socket(SocketType::Pull, "CURVE", &[server]).unwrap();
    let address = pull.bind("tcp://127.0.0.1:0").await.unwrap();

    let wrong = CurveKeyPair::generate().public;
    let push = ctx.new_socket(SocketType::Push, "CURVE", &client_options(wrong)).unwrap();
    push.connect(&address).await.unwrap();
    assert_eq!(push.peer_count(), 0);
    assert!(matches!(push.send(vec![Bytes::from("x")]).await, Err(Error::NoPeers)));

    push.close().await.unwrap();
    pull.close().await.unwrap();
    assert!(monitor
        .try_iter()
        .any(|e| e.kind == EventKind::FailedHandshake));
}
