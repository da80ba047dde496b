//! Adapter integration: JSON-lines switch sessions over a Unix socket.

use std::path::PathBuf;
use std::time::Duration;

use smoltcp::wire::EthernetAddress;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::time::timeout;
use vlanctl::adapter;
use vlanctl::forwarder::Forwarder;
use vlanctl::messaging::{Action, Command, CommandRouter, Event, FlowPriority};
use vlanctl::subnets::SubnetTable;
use vlanctl::test_util::{ipv4_frame, mac};

const WAIT: Duration = Duration::from_secs(5);

async fn connect(socket: &PathBuf) -> UnixStream {
    // The listener binds asynchronously after serve() is spawned
    for _ in 0..100 {
        if let Ok(stream) = UnixStream::connect(socket).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("control socket never came up at {}", socket.display());
}

async fn recv_event(rx: &mut UnboundedReceiver<Event>) -> Event {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_session_produces_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("vlanctl.sock");

    let (event_tx, mut event_rx) = unbounded_channel();
    let commands = CommandRouter::new();
    tokio::spawn(adapter::serve(socket.clone(), event_tx, commands));

    let stream = connect(&socket).await;
    let (_read, mut write) = stream.into_split();

    write
        .write_all(b"{\"type\":\"switch_connected\",\"switch\":1}\n")
        .await
        .unwrap();
    write
        .write_all(b"{\"type\":\"packet_in\",\"switch\":1,\"in_port\":3,\"data\":[1,2,3]}\n")
        .await
        .unwrap();
    // Malformed lines are ignored, not fatal
    write.write_all(b"not json\n").await.unwrap();

    assert_eq!(
        recv_event(&mut event_rx).await,
        Event::SwitchConnected { switch: 1 }
    );
    assert_eq!(
        recv_event(&mut event_rx).await,
        Event::PacketIn {
            switch: 1,
            in_port: 3,
            data: vec![1, 2, 3],
        }
    );

    // Closing the session synthesizes the disconnect
    drop(write);
    drop(_read);
    assert_eq!(
        recv_event(&mut event_rx).await,
        Event::SwitchDisconnected { switch: 1 }
    );
}

#[tokio::test]
async fn test_engine_commands_flow_back_over_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("vlanctl.sock");

    let subnets = SubnetTable::new(vec![
        (10, "10.0.1.0/24".parse().unwrap()),
        (20, "10.0.2.0/24".parse().unwrap()),
    ]);
    let forwarder = Forwarder::new(subnets, EthernetAddress([0, 0, 0, 0, 0, 1]));

    let (event_tx, event_rx) = unbounded_channel();
    let commands = CommandRouter::new();
    tokio::spawn(adapter::serve(socket.clone(), event_tx, commands.clone()));
    tokio::spawn(forwarder.run(event_rx, commands));

    let stream = connect(&socket).await;
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    let send = |event: Event| {
        let mut line = serde_json::to_string(&event).unwrap();
        line.push('\n');
        line
    };

    write
        .write_all(send(Event::SwitchConnected { switch: 1 }).as_bytes())
        .await
        .unwrap();

    let line = timeout(WAIT, lines.next_line())
        .await
        .expect("timed out waiting for command")
        .unwrap()
        .expect("session closed early");
    let command: Command = serde_json::from_str(&line).unwrap();
    assert_eq!(
        command,
        Command::InstallFlow {
            switch: 1,
            priority: FlowPriority::TableMiss,
            matching: Default::default(),
            actions: vec![Action::ToController],
        }
    );

    // Teach the engine where mac(2) lives, then send a frame toward it
    let h1 = "10.0.1.1".parse().unwrap();
    let h3 = "10.0.1.3".parse().unwrap();
    write
        .write_all(
            send(Event::PacketIn {
                switch: 1,
                in_port: 2,
                data: ipv4_frame(mac(1), mac(2), Some(10), h3, h1),
            })
            .as_bytes(),
        )
        .await
        .unwrap();
    write
        .write_all(
            send(Event::PacketIn {
                switch: 1,
                in_port: 1,
                data: ipv4_frame(mac(2), mac(1), Some(10), h1, h3),
            })
            .as_bytes(),
        )
        .await
        .unwrap();

    // The known destination yields a rule install followed by the delivery
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    match serde_json::from_str::<Command>(&line).unwrap() {
        Command::InstallFlow { priority, .. } => assert_eq!(priority, FlowPriority::IntraVlan),
        other => panic!("expected InstallFlow, got {other:?}"),
    }
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    match serde_json::from_str::<Command>(&line).unwrap() {
        Command::PacketOut { actions, .. } => {
            assert_eq!(actions, vec![Action::Output { port: 2 }]);
        }
        other => panic!("expected PacketOut, got {other:?}"),
    }
}
