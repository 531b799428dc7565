use std::env;
use std::time::Duration;

use daikin_local::DaikinClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).expect("usage: monitor <host> [--log <path>]");
    let log_path = args
        .iter()
        .position(|a| a == "--log")
        .and_then(|i| args.get(i + 1));

    let mut builder = DaikinClient::builder(host.as_str()).on_snapshot(|state| {
        println!(
            "mode: {} | fan: {} | swing: {}",
            state.mode, state.fan_speed, state.swing
        );
        if let Some(target) = state.target_temperature {
            println!("target: {target:.1}\u{00b0}C");
        }
        if let Some(indoor) = state.current_temperature {
            print!("indoor: {indoor:.1}\u{00b0}C");
            if let Some(humidity) = state.current_humidity {
                print!(" / {humidity}%");
            }
            println!();
        }
        if let Some(outdoor) = state.outside_temperature {
            println!("outdoor: {outdoor:.1}\u{00b0}C");
        }
        if let Some(kwh) = state.energy_today_kwh {
            println!("energy today: {kwh} kWh");
        }
    });
    if let Some(path) = log_path {
        println!("logging all requests/responses to {path}");
        builder = builder.message_log(path.as_str());
    }
    let mut client = builder.build();

    let id = client.resolve_identity().await;
    println!("device: {id}, polling...");

    loop {
        client.poll().await;
        if !client.available()
            && let Some(wait) = client.next_retry_in()
        {
            eprintln!("unreachable, next attempt in {}s", wait.as_secs());
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}
