//! Client library tests against an in-process broker.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relaymq::protocol::{Frame, FrameCodec, FrameType};
use relaymq::{BrokerConfig, BrokerServer, EventLog, InMemoryEventLog};
use relaymq_client::{
    BookingCancelled, ClientConfig, CustomerCreated, DomainEvent, EventBusClient, EventReceiver,
    RoomCreated,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;
use uuid::Uuid;

async fn start_broker() -> (SocketAddr, Arc<BrokerServer>, Arc<InMemoryEventLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let log = Arc::new(InMemoryEventLog::new());
    let server = Arc::new(BrokerServer::with_log(
        BrokerConfig::default(),
        Arc::clone(&log) as Arc<dyn EventLog>,
    ));

    let handle = Arc::clone(&server);
    tokio::spawn(async move {
        handle.serve(listener).await.unwrap();
    });

    (addr, server, log)
}

fn client_config(addr: SocketAddr, request_replay: bool) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        request_replay,
        ..Default::default()
    }
}

async fn wait_for_subscribers(server: &BrokerServer, kind: u8, count: usize) {
    for _ in 0..500 {
        if server.registry().subscriber_count(kind) >= count {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} subscriber(s) for type {}", count, kind);
}

fn cancellation(room_number: i64) -> BookingCancelled {
    BookingCancelled {
        cancelled_at_ms: 1_700_000_000_000,
        booking_id: Uuid::new_v4(),
        room_number,
    }
}

#[tokio::test]
async fn events_published_before_connect_arrive_in_order() {
    let (addr, server, _log) = start_broker().await;

    // raw framed subscriber so wire order is observed directly
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut subscriber = Framed::new(stream, FrameCodec::new());
    subscriber
        .send(Frame::register_consumers(&[BookingCancelled::KIND.as_byte()], false).unwrap())
        .await
        .unwrap();
    wait_for_subscribers(&server, BookingCancelled::KIND.as_byte(), 1).await;

    let producer = EventBusClient::start(client_config(addr, false), Vec::new());

    // published while the dial may still be in flight
    let first = cancellation(1);
    let second = cancellation(2);
    producer.publish(&first).unwrap();
    producer.publish(&second).unwrap();

    let mut received = Vec::new();
    for _ in 0..2 {
        let frame = timeout(Duration::from_secs(5), subscriber.next())
            .await
            .expect("timed out")
            .unwrap()
            .unwrap();
        assert_eq!(frame.frame_type(), Some(FrameType::Consume));
        received.push(frame.payload());
    }

    assert_eq!(received[0], Bytes::from(first.encode()));
    assert_eq!(received[1], Bytes::from(second.encode()));
}

#[tokio::test]
async fn failed_dial_keeps_events_queued() {
    // grab a port with nothing listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let producer = EventBusClient::start(client_config(addr, false), Vec::new());
    producer.publish(&cancellation(1)).unwrap();
    producer.publish(&cancellation(2)).unwrap();

    sleep(Duration::from_millis(300)).await;
    assert!(!producer.is_ready());
    assert_eq!(producer.pending_events(), 2);
}

#[tokio::test]
async fn handlers_receive_published_events() {
    let (addr, server, _log) = start_broker().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancelled_tx = tx.clone();

    let mut receiver = EventReceiver::new();
    receiver.register(move |event: BookingCancelled| {
        cancelled_tx.send(format!("cancelled:{}", event.room_number)).unwrap();
    });
    receiver.register(move |event: RoomCreated| {
        tx.send(format!("created:{}", event.room_number)).unwrap();
    });

    let _consumer = EventBusClient::start(client_config(addr, false), vec![receiver]);
    wait_for_subscribers(&server, BookingCancelled::KIND.as_byte(), 1).await;
    wait_for_subscribers(&server, RoomCreated::KIND.as_byte(), 1).await;

    let producer = EventBusClient::start(client_config(addr, false), Vec::new());
    producer.publish(&cancellation(7)).unwrap();
    producer
        .publish(&RoomCreated {
            created_at_ms: 1,
            room_number: 9,
            room_name: "Garden".to_string(),
            description: "Ground floor".to_string(),
            price: 80.0,
        })
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..2 {
        let message = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .unwrap();
        seen.push(message);
    }
    seen.sort();
    assert_eq!(seen, vec!["cancelled:7".to_string(), "created:9".to_string()]);
}

#[tokio::test]
async fn replay_delivers_history_to_late_consumer() {
    let (addr, server, log) = start_broker().await;

    let producer = EventBusClient::start(client_config(addr, false), Vec::new());
    let historical = CustomerCreated {
        created_at_ms: 1_700_000_000_000,
        customer_id: Uuid::new_v4(),
        customer_number: 88,
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        birthday_epoch_days: -21185,
    };
    producer.publish(&historical).unwrap();

    // wait until the broker has durably appended the event
    for _ in 0..500 {
        if !log
            .list_ascending(CustomerCreated::KIND.as_byte())
            .unwrap()
            .is_empty()
        {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut receiver = EventReceiver::new();
    receiver.register(move |event: CustomerCreated| {
        tx.send(event).unwrap();
    });

    let _consumer = EventBusClient::start(client_config(addr, true), vec![receiver]);
    wait_for_subscribers(&server, CustomerCreated::KIND.as_byte(), 1).await;

    let replayed = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for replay")
        .unwrap();
    assert_eq!(replayed, historical);
}
