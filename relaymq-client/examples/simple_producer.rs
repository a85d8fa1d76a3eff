//! Simple producer example: publishes a room and a booking to the bus.

use relaymq_client::*;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let client = EventBusClient::start(ClientConfig::default(), Vec::new());

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;

    client.publish(&RoomCreated {
        created_at_ms: now_ms,
        room_number: 101,
        room_name: "Seaside".to_string(),
        description: "Double room with a view".to_string(),
        price: 129.99,
    })?;
    println!("published RoomCreated for room 101");

    client.publish(&RoomBooked {
        booked_at_ms: now_ms,
        event_id: Uuid::new_v4(),
        room_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
    })?;
    println!("published RoomBooked");

    // give the dial and the queued publishes a moment to reach the broker
    sleep(Duration::from_secs(1)).await;
    println!("done, connection ready: {}", client.is_ready());

    Ok(())
}
