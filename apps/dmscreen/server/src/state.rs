use std::{path::PathBuf, sync::Arc};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::{
    netinfo::{self, InterfaceSource},
    registry::ConnectionRegistry,
};

pub struct AppState {
    pub registry: ConnectionRegistry,
    pub public_dir: PathBuf,
    pub interfaces: Arc<dyn InterfaceSource>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(
        registry: ConnectionRegistry,
        public_dir: impl Into<PathBuf>,
        interfaces: Arc<dyn InterfaceSource>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            public_dir: public_dir.into(),
            interfaces,
            metrics,
        }
    }

    pub fn local_address(&self) -> String {
        netinfo::local_address(self.interfaces.as_ref())
    }

    pub fn player_page(&self) -> PathBuf {
        self.public_dir.join("player.html")
    }

    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }
}
