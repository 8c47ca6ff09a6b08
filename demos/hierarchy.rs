//! # Example: Hierarchy and scopes
//!
//! A root bus with two departments underneath. Local events stay on their
//! bus; Global events climb to the root and fan back out to siblings.

use std::sync::Arc;

use treebus::{Bus, BusError, Capabilities, Event, Listen, Scope};

struct Announcement {
    text: String,
}

struct Desk {
    label: &'static str,
}

impl Listen for Desk {
    fn capabilities(caps: &mut Capabilities<Self>) {
        caps.on(|desk: &Desk, _ev: &Event, msg: &Announcement| {
            println!("[{}] announcement: {}", desk.label, msg.text);
            Ok(())
        });
        caps.on_any(|desk: &Desk, ev: &Event| {
            println!("[{}] saw a {} event", desk.label, ev.payload_type_name());
            Ok(())
        });
    }
}

fn main() -> Result<(), BusError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treebus=debug".into()),
        )
        .init();

    let company = Bus::builder().with_name("company").build();
    let sales = Bus::builder().with_name("sales").build();
    let support = Bus::builder().with_name("support").build();
    sales.set_parent(Some(&company));
    support.set_parent(Some(&company));

    let sales_desk = Arc::new(Desk { label: "sales" });
    let support_desk = Arc::new(Desk { label: "support" });
    let lobby = Arc::new(Desk { label: "lobby" });
    sales.register(&sales_desk);
    support.register(&support_desk);
    company.register(&lobby);

    println!("--- local on sales: only the sales desk hears it ---");
    sales.publish(
        Announcement {
            text: "team standup in 5".to_string(),
        },
        Scope::Local,
    )?;

    println!("--- global on sales: climbs to company, fans out to support ---");
    sales.publish(
        Announcement {
            text: "Q3 numbers are out".to_string(),
        },
        Scope::Global,
    )?;

    println!("--- local on company: ripples down to both departments ---");
    company.publish(
        Announcement {
            text: "fire drill at noon".to_string(),
        },
        Scope::Local,
    )?;

    Ok(())
}
