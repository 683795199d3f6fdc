use melcloud_sync::{Event, MelCloudClient};
use std::env;

#[tokio::main]
async fn main() -> melcloud_sync::Result<()> {
    tracing_subscriber::fmt::init();

    let email = env::var("MELCLOUD_EMAIL").expect("MELCLOUD_EMAIL not set");
    let password = env::var("MELCLOUD_PASSWORD").expect("MELCLOUD_PASSWORD not set");
    let dump_dir = env::args().nth(1);

    let mut builder = MelCloudClient::builder(email, password).on_event(|event| match event {
        Event::Connected {
            account,
            device_count,
            unit_label,
            ..
        } => println!("Connected as {account}: {device_count} device(s), units {unit_label}"),
        Event::StateChanged { device, state } => {
            let room = state
                .room_temperature
                .map(|t| format!("{t}"))
                .unwrap_or_else(|| "-".into());
            println!(
                "[{}] power: {} | room: {room} | mode: {:?} | fan: {:?}{}",
                device.name,
                state.power,
                state.operation_mode,
                state.fan_speed,
                if state.has_pending_command { " | PENDING" } else { "" },
            );
            if let Some(vent) = &state.ventilation {
                println!(
                    "[{}] ventilation: {:?} | CO2: {:?}",
                    device.name, vent.ventilation_mode, vent.room_co2_level
                );
            }
        }
        Event::InfoChanged { device_id, info } => {
            println!(
                "[{device_id}] {} {} / {} | serial {} | fw {}",
                info.manufacturer, info.indoor_model, info.outdoor_model, info.serial_number, info.firmware_version
            );
        }
        Event::Error { message, .. } => eprintln!("Error: {message}"),
        Event::Debug { .. } => {}
    });

    if let Some(dir) = dump_dir {
        builder = builder.payload_dump(dir);
    }

    let mut client = builder.build()?;

    println!("Logging in...");
    client.connect().await?;
    let pollers = client.start()?;
    println!("Polling {pollers} device(s). Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    client.shutdown().await;
    Ok(())
}
