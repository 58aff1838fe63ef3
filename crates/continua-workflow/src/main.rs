// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Continua Workflow demo
//!
//! Runs an order that waits for a payment and then a shipment event, and
//! triggers both events.

use std::sync::Arc;

use anyhow::Result;
use continua_core::{Continuable, Continuation, Signal};
use serde_json::json;
use tracing::{error, info};

use continua_workflow::{Event, EventContinuation, Workflow, WorkflowConfig};

#[derive(Default)]
struct Order {
    paid: Option<serde_json::Value>,
}

impl Order {
    const PAID: u32 = 1;
    const SHIPPED: u32 = 2;
}

impl Continuable for Order {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        match cx.label() {
            None => {
                info!(order = %cx.id(), "Order placed, waiting for payment");
                cx.wait_for_event(Self::PAID, "payment")
            }
            Some(Self::PAID) => {
                self.paid = cx.take_event().and_then(|event| event.data().cloned());
                info!(order = %cx.id(), payment = ?self.paid, "Payment received, waiting for shipment");
                cx.wait_for_event(Self::SHIPPED, "shipment")
            }
            Some(_) => {
                let shipment = cx.take_event();
                info!(
                    order = %cx.id(),
                    payment = ?self.paid,
                    shipment = ?shipment.as_ref().and_then(Event::data),
                    "Order shipped"
                );
                cx.complete()
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Continua Workflow demo");

    // Load configuration
    let config = WorkflowConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        continuation_duration_ms = config.core.continuation_duration.as_millis() as u64,
        max_concurrent_tasks = config.max_concurrent_tasks,
        "Configuration loaded"
    );

    let workflow = Workflow::builder()
        .config(config)
        .register("order", || Box::new(Order::default()))
        .build()?;

    workflow.add_listener(Arc::new(|event: &Event| {
        info!(event_type = %event.event_type(), "Event triggered");
    }));

    let waiting = workflow.start("order").await??;
    info!(continuation_id = ?waiting, "Order parked");

    for event in [
        Event::new("payment").with_data(json!({ "amount": 42, "currency": "EUR" })),
        Event::new("shipment").with_data(json!({ "carrier": "inpost" })),
    ] {
        for handle in workflow.trigger(event) {
            let parked = handle.await??;
            info!(continuation_id = ?parked, "Order step finished");
        }
    }

    workflow.shutdown();
    info!("Continua Workflow demo finished");

    Ok(())
}
