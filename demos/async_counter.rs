//! # Example: Asynchronous dispatch
//!
//! An asynchronous bus enqueues each handler invocation on the tokio
//! blocking pool: publish returns immediately, slow listeners never stall
//! the publisher, and a panicking listener takes down only its own unit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use treebus::{Bus, Capabilities, Event, Listen, Scope};

#[derive(Default)]
struct SlowAuditor {
    processed: AtomicUsize,
}

impl Listen for SlowAuditor {
    fn capabilities(caps: &mut Capabilities<Self>) {
        caps.on(|auditor: &SlowAuditor, _ev: &Event, n: &u64| {
            std::thread::sleep(Duration::from_millis(50));
            auditor.processed.fetch_add(1, Ordering::Relaxed);
            println!("[auditor] processed {n}");
            Ok(())
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treebus=debug".into()),
        )
        .init();

    let bus = Bus::asynchronous()?;
    let auditor = Arc::new(SlowAuditor::default());
    bus.register(&auditor);

    let started = Instant::now();
    for n in 0..10u64 {
        bus.publish(n, Scope::Local)?;
    }
    println!(
        "published 10 events in {:?} (each handler sleeps 50ms)",
        started.elapsed()
    );

    while auditor.processed.load(Ordering::Relaxed) < 10 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    println!("all 10 processed after {:?}", started.elapsed());
    Ok(())
}
