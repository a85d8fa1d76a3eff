//! Simple consumer example: replays and follows room events from the bus.

use relaymq_client::*;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut receiver = EventReceiver::new();
    receiver.register(|event: RoomCreated| {
        println!(
            "room {} created: {} ({} EUR)",
            event.room_number, event.room_name, event.price
        );
    });
    receiver.register(|event: RoomBooked| {
        println!("room {} booked by {}", event.room_id, event.customer_id);
    });

    let config = ClientConfig {
        request_replay: true,
        ..Default::default()
    };
    let _client = EventBusClient::start(config, vec![receiver]);

    println!("listening for room events, ctrl-c to stop");
    signal::ctrl_c().await?;

    Ok(())
}
