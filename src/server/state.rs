use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::print_queue::{JobStore, PrintPipeline};

use super::websocket::ConnectionManager;
use super::ServerConfig;

pub type GuardedJobStore = Arc<JobStore>;
pub type GuardedConnectionManager = Arc<ConnectionManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub pipeline: PrintPipeline,
    pub ws_connection_manager: GuardedConnectionManager,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        pipeline: PrintPipeline,
        ws_connection_manager: GuardedConnectionManager,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            pipeline,
            ws_connection_manager,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for PrintPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for GuardedJobStore {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.store().clone()
    }
}

impl FromRef<ServerState> for GuardedConnectionManager {
    fn from_ref(input: &ServerState) -> Self {
        input.ws_connection_manager.clone()
    }
}
