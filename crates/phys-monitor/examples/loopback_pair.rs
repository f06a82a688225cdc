//! Two monitored stacks over an in-memory loopback link.
//!
//! The client starts before the server is listening, so its first opens are
//! refused and it retries on the configured interval. Once both ends are up
//! the link is dropped underneath them and both monitors reconnect on their
//! own. Finally both are stopped.
//!
//! Run with:
//! ```bash
//! cargo run -p phys-monitor --example loopback_pair --features tracing
//! ```

use phys_monitor::{
    ConnectionState, MonitorConfig, PhysLayerMonitor, TokioTimerSource, UpperLayerHook, loopback,
};
use std::sync::Arc;
use std::time::Duration;

struct Session(&'static str);

impl UpperLayerHook for Session {
    fn on_physical_layer_open(&self) {
        println!("[{}] link up, starting session", self.0);
    }

    fn on_physical_layer_open_failure(&self) {
        println!("[{}] open refused", self.0);
    }

    fn on_physical_layer_close(&self) {
        println!("[{}] link down, session closed", self.0);
    }
}

fn monitor(
    name: &'static str,
    layer: Arc<loopback::LoopbackLayer>,
    timers: Arc<TokioTimerSource>,
) -> Arc<PhysLayerMonitor> {
    let config = MonitorConfig::builder()
        .name(name)
        .open_retry(Duration::from_millis(250))
        .on_state_transition(move |from, to| {
            println!("[{}] {} -> {}", name, from, to);
        })
        .on_retry_scheduled(move |delay| {
            println!("[{}] retrying in {:?}", name, delay);
        })
        .build();
    PhysLayerMonitor::with_hook(config, layer, timers, Session(name))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let (acceptor, initiator) = loopback::pair(&tokio::runtime::Handle::current());
    let timers = Arc::new(TokioTimerSource::current());

    let server = monitor("server", acceptor, timers.clone());
    let client = monitor("client", initiator.clone(), timers);

    println!("--- client starts alone ---");
    client.start();
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("--- server starts listening ---");
    server.start();
    client
        .wait_for_state_async(ConnectionState::Open)
        .await
        .expect("client connects");

    println!("--- link drops ---");
    initiator.drop_link();
    tokio::time::sleep(Duration::from_millis(600)).await;
    client
        .wait_for_state_async(ConnectionState::Open)
        .await
        .expect("client reconnects");

    println!("--- shutting down ---");
    client.stop();
    server.stop();
    server
        .wait_for_state_async(ConnectionState::Stopped)
        .await
        .expect("server stops");
    client
        .wait_for_state_async(ConnectionState::Stopped)
        .await
        .expect("client stops");
}
