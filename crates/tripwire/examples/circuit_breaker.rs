// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Simulates an outage of a remote service and shows how the breaker:
//!
//! 1. Opens once too many calls fail
//! 2. Fails fast while the service is down
//! 3. Lets probe calls through after the cool-down
//! 4. Closes when the service recovers

use std::time::Duration;

use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tripwire::{Breaker, BreakerError, BreakerOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let meter_provider = configure_telemetry();
    let clock = Clock::new_tokio();

    let breaker = Breaker::new(
        BreakerOptions::standard("inventory_service", &clock)
            // Decrease the following values to see the breaker recover faster
            .open_cooldown(Duration::from_millis(500))
            .rolling_window(Duration::from_secs(2))
            .enable_metrics(&meter_provider)
            .on_state_change(|args| println!("breaker '{}' moved from {} to {}", args.name(), args.from(), args.to())),
    );

    // The service is down for the first 40 calls. Increase the number of calls to see the
    // breaker close once the service recovers.
    for attempt in 0..60 {
        clock.delay(Duration::from_millis(50)).await;

        match breaker.execute_async(|| call_service(attempt)).await {
            Ok(output) => println!("{attempt}: {output}"),
            Err(BreakerError::Inner(error)) => println!("{attempt}: call failed: {error}"),
            Err(rejected) => println!("{attempt}: {rejected}"),
        }
    }

    println!("final state: {}, counts: {:?}", breaker.state(), breaker.counts());

    // Flush metrics to stdout before exiting
    meter_provider.force_flush()?;

    Ok(())
}

async fn call_service(attempt: u32) -> Result<String, String> {
    if attempt >= 40 {
        return Ok(format!("stock-{attempt}"));
    }

    // 70% of the calls fail during the outage
    if fastrand::u8(0..10) < 7 {
        Err(format!("service unavailable for '{attempt}'"))
    } else {
        Ok(format!("stock-{attempt}"))
    }
}

fn configure_telemetry() -> SdkMeterProvider {
    // Set up tracing subscriber for logs to console
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    SdkMeterProvider::builder()
        .with_periodic_exporter(MetricExporter::default())
        .build()
}
