use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::CollectorConfig;
use crate::errors::{Error, Result};
use crate::table::MetricsTable;
use crate::{listener, rest, sweeper};

/// Owns the device table and the sockets feeding and exposing it.
pub struct Collector {
    config: CollectorConfig,
    table: Arc<MetricsTable>,
    udp: UdpSocket,
    http: TcpListener,
}

impl Collector {
    /// Binds both sockets. A bind failure is an operator error and is not retried.
    pub async fn bind(config: CollectorConfig) -> Result<Self> {
        config.validate()?;

        let udp = UdpSocket::bind(config.udp_addr)
            .await
            .map_err(|source| Error::Bind {
                what: "UDP report",
                addr: config.udp_addr,
                source,
            })?;
        let http = TcpListener::bind(config.http_addr)
            .await
            .map_err(|source| Error::Bind {
                what: "HTTP metrics",
                addr: config.http_addr,
                source,
            })?;

        info!(
            "Expiry horizon: {:?}, sweep every {:?}",
            config.statistics_timeout, config.sweep_interval
        );

        Ok(Self {
            config,
            table: Arc::new(MetricsTable::new()),
            udp,
            http,
        })
    }

    pub fn table(&self) -> Arc<MetricsTable> {
        self.table.clone()
    }

    pub fn udp_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp.local_addr()?)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        Ok(self.http.local_addr()?)
    }

    /// Runs the report listener, the HTTP server and the expiry sweeper until
    /// `shutdown` resolves or one of them stops. In-flight work is abandoned
    /// on shutdown; reports are fire-and-forget and scrapes are idempotent.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Collector {
            config,
            table,
            udp,
            http,
        } = self;

        match http.local_addr() {
            Ok(addr) => info!("HTTP server listening on http://{}/metrics", addr),
            Err(e) => error!("HTTP listener has no local address: {}", e),
        }

        let mut listener_handle = tokio::spawn(listener::run_listener(udp, table.clone()));
        let mut sweeper_handle = tokio::spawn(sweeper::run_sweeper(
            table.clone(),
            config.sweep_interval,
            config.statistics_timeout,
        ));
        let app = rest::create_router(table);
        let mut server_handle = tokio::spawn(async move { axum::serve(http, app).await });

        let result = tokio::select! {
            res = &mut listener_handle => {
                error!("Report listener terminated");
                res.map_err(Error::from)
            }
            res = &mut sweeper_handle => {
                error!("Expiry sweeper terminated");
                res.map_err(Error::from)
            }
            res = &mut server_handle => {
                error!("HTTP server terminated");
                match res {
                    Ok(served) => served.map_err(Error::from),
                    Err(e) => Err(Error::from(e)),
                }
            }
            _ = shutdown => {
                info!("Received shutdown signal");
                Ok(())
            }
        };

        listener_handle.abort();
        sweeper_handle.abort();
        server_handle.abort();

        info!("Collector stopped");
        result
    }

    /// Runs the collector in the background. Intended for test harnesses.
    pub fn spawn(self) -> Result<CollectorHandle> {
        let udp_addr = self.udp_addr()?;
        let http_addr = self.http_addr()?;
        let table = self.table();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(self.run_until(async move {
            let _ = stop_rx.await;
        }));

        Ok(CollectorHandle {
            udp_addr,
            http_addr,
            table,
            stop_tx,
            task,
        })
    }
}

pub struct CollectorHandle {
    pub udp_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub table: Arc<MetricsTable>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl CollectorHandle {
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(());
        self.task.await?
    }
}

/// Binds and runs the collector until Ctrl-C.
pub async fn start(config: CollectorConfig) -> Result<()> {
    let collector = Collector::bind(config).await?;
    collector
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
