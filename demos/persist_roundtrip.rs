//! # Example: Save and restore (feature `persist`)
//!
//! A durable counter is registered on a persistent bus, fed some events,
//! snapshotted to JSON, then rebuilt from those bytes. The restored
//! listener keeps counting where the saved one left off.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use treebus::{
    Bus, BusSnapshot, Capabilities, Event, Listen, ListenerCodec, PersistListen, PersistentBus,
    Scope,
};

#[derive(Default, Serialize, Deserialize)]
struct OrderCounter {
    orders: AtomicU64,
}

impl Listen for OrderCounter {
    fn capabilities(caps: &mut Capabilities<Self>) {
        caps.on(|c: &OrderCounter, _ev: &Event, sku: &String| {
            let total = c.orders.fetch_add(1, Ordering::Relaxed) + 1;
            println!("[counter] order #{total}: {sku}");
            Ok(())
        });
    }
}

impl PersistListen for OrderCounter {
    const TAG: &'static str = "order-counter";
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treebus=debug".into()),
        )
        .init();

    let bus = PersistentBus::synchronous();
    let counter = Arc::new(OrderCounter::default());
    bus.register(&counter);

    bus.publish("sku-1001".to_string(), Scope::Local)?;
    bus.publish("sku-1002".to_string(), Scope::Local)?;

    let json = serde_json::to_string_pretty(&bus.save()?)?;
    println!("--- snapshot ---\n{json}");

    // Some process restart later...
    let snapshot: BusSnapshot = serde_json::from_str(&json)?;
    let codec = ListenerCodec::new().with::<OrderCounter>();
    let restored = PersistentBus::restore(snapshot, &Bus::synchronous, &codec)?;

    restored.publish("sku-1003".to_string(), Scope::Local)?;
    Ok(())
}
