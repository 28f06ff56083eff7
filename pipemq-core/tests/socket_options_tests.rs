//! Integration tests for socket options and the reconnect schedule they drive

use pipemq_core::options::SocketOptions;
use pipemq_core::reconnect::ReconnectState;
use std::time::Duration;

#[test]
fn test_builder_sets_every_field() {
    let opts = SocketOptions::new()
        .with_recv_timeout(Duration::from_millis(250))
        .with_handshake_timeout(Duration::from_secs(2))
        .with_reconnect_ivl(Duration::from_millis(50))
        .with_reconnect_ivl_max(Duration::from_secs(1))
        .with_connect_timeout(Duration::from_millis(500))
        .with_send_hwm(16)
        .with_recv_hwm(32)
        .with_max_msg_size(1 << 20)
        .with_read_buffer_size(4096);

    assert_eq!(opts.recv_timeout, Some(Duration::from_millis(250)));
    assert_eq!(opts.handshake_timeout, Duration::from_secs(2));
    assert_eq!(opts.reconnect_ivl, Duration::from_millis(50));
    assert_eq!(opts.reconnect_ivl_max, Duration::from_secs(1));
    assert_eq!(opts.connect_timeout, Duration::from_millis(500));
    assert_eq!(opts.send_hwm, 16);
    assert_eq!(opts.recv_hwm, 32);
    assert_eq!(opts.max_msg_size, Some(1 << 20));
    assert_eq!(opts.read_buffer_size, 4096);
}

#[test]
fn test_reconnect_delays_are_monotonic() {
    let opts = SocketOptions::new()
        .with_reconnect_ivl(Duration::from_millis(10))
        .with_reconnect_ivl_max(Duration::from_millis(300));
    let mut state = ReconnectState::new(&opts);

    let mut previous = Duration::ZERO;
    for _ in 0..20 {
        let delay = state.next_delay();
        assert!(delay >= previous);
        assert!(delay <= Duration::from_millis(300));
        previous = delay;
    }
}

#[test]
fn test_max_below_base_keeps_fixed_interval() {
    let opts = SocketOptions::new()
        .with_reconnect_ivl(Duration::from_millis(200))
        .with_reconnect_ivl_max(Duration::from_millis(50));
    let mut state = ReconnectState::new(&opts);

    assert_eq!(state.next_delay(), Duration::from_millis(200));
    assert_eq!(state.next_delay(), Duration::from_millis(200));
}
