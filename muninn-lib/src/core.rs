//! Core orchestrator: builds every component from the parsed configuration
//! and owns their lifetimes.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::capture::{FrameSource, InterfaceRuntime, RawSocketSource};
use crate::config::{Config, Tunables};
use crate::control::ControlServer;
use crate::error::Result;
use crate::events::{EventManager, EventSink};
use crate::filters::Filters;
use crate::rules::RuleSet;
use crate::stats::PacketStats;

pub struct Core {
    pub stats: Arc<PacketStats>,
    pub sink: EventSink,
    interfaces: Vec<InterfaceRuntime>,
    event_drain: JoinHandle<()>,
    control: JoinHandle<()>,
}

impl Core {
    /// Bring the sensor up on the real capture sockets.
    pub async fn start(cfg: Config, token: CancellationToken) -> Result<Self> {
        Self::start_with_sources(cfg, token, |ifname| {
            RawSocketSource::open(ifname).map(|s| Box::new(s) as Box<dyn FrameSource>)
        })
        .await
    }

    /// Startup with an injectable frame source per interface, the seam the
    /// tests and the replay tool use.
    pub async fn start_with_sources<F>(
        cfg: Config,
        token: CancellationToken,
        mut open_source: F,
    ) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Box<dyn FrameSource>>,
    {
        let tunables = Tunables::load_from_path(&cfg.tunables_config)?;
        info!(path = %cfg.tunables_config, "tunables loaded");

        let ifnames: Vec<String> =
            cfg.interface_info.iter().map(|i| i.interface.clone()).collect();
        let stats = Arc::new(PacketStats::new(ifnames));

        let (sink, manager) = EventManager::new(cfg.events.clone(), stats.clone()).await?;
        let event_drain = tokio::spawn(manager.run(token.clone()));
        info!("event manager started");

        let mut interfaces = Vec::new();
        for intf in &cfg.interface_info {
            let rules = Arc::new(RuleSet::load_from_path(&intf.rule_file)?);
            info!(
                ifname = %intf.interface,
                rule_file = %intf.rule_file,
                rules = rules.rules.len(),
                "rules loaded"
            );

            let filters = Arc::new(Filters::new(rules, &tunables));
            let source = open_source(&intf.interface)?;
            interfaces.push(InterfaceRuntime::spawn(
                intf.interface.clone(),
                source,
                filters,
                stats.clone(),
                sink.clone(),
                token.clone(),
            ));
            info!(ifname = %intf.interface, "interface runtime started");
        }

        let control = ControlServer::bind(&cfg.control_socket_path, stats.clone())?;
        let control = tokio::spawn(control.run(token.clone()));

        Ok(Self { stats, sink, interfaces, event_drain, control })
    }

    /// Wait for every task to finish. Call after cancelling the token; the
    /// event drain flushes pending events before it returns.
    pub async fn shutdown(self) {
        for intf in self.interfaces {
            intf.join().await;
        }
        let _ = self.control.await;
        let _ = self.event_drain.await;
        info!("sensor stopped");
    }
}
