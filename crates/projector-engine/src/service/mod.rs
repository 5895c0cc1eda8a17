//! Request-facing surface of the overlay.
//!
//! The transport (socket server, IPC, tests) hands over already-parsed JSON
//! requests; [`OverlayService`] admits them through a [`RequestGate`],
//! dispatches through the [`CommandTable`] and shapes the response.

mod commands;
mod gate;

pub use commands::{CommandTable, Handler};
pub use gate::{RequestGate, RequestGuard};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::error::{OverlayError, Result};
use crate::scene::Scene;

/// Scene plus the command table and admission gate in front of it.
#[derive(Debug)]
pub struct OverlayService {
    scene: Arc<Scene>,
    commands: CommandTable,
    gate: RequestGate,
}

impl OverlayService {
    pub fn new(scene: Arc<Scene>) -> Self {
        Self::with_commands(scene, CommandTable::new())
    }

    pub fn with_commands(scene: Arc<Scene>, commands: CommandTable) -> Self {
        log::debug!("command table ready with {} operations", commands.len());
        Self { scene, commands, gate: RequestGate::new() }
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// Runs one operation. Refused with `ShuttingDown` once teardown began.
    pub fn execute(&self, action: &str, args: Value) -> Result<Value> {
        let _guard = self.gate.enter()?;
        let result = self.commands.execute(&self.scene, action, args);
        if let Err(e) = &result {
            log::debug!("'{action}' failed: {e}");
        }
        result
    }

    /// Handles a `{"action": name, ...params}` request and never fails: errors
    /// become `{"status": "error", "code", "message"}`.
    pub fn handle(&self, request: Value) -> Value {
        let Value::Object(mut params) = request else {
            return error_response(&OverlayError::InvalidArgument("request must be an object".into()));
        };
        let action = match params.remove("action") {
            Some(Value::String(action)) => action,
            _ => return error_response(&OverlayError::InvalidArgument("missing 'action'".into())),
        };

        match self.execute(&action, Value::Object(params)) {
            Ok(Value::Object(mut body)) => {
                body.insert("status".into(), json!("success"));
                Value::Object(body)
            }
            Ok(other) => {
                let mut body = Map::new();
                body.insert("status".into(), json!("success"));
                body.insert("result".into(), other);
                Value::Object(body)
            }
            Err(e) => error_response(&e),
        }
    }

    /// First two teardown steps: refuse new requests, then wait for the ones
    /// already running. Returns false if the drain timed out.
    pub fn shutdown(&self, drain_timeout: Duration) -> bool {
        self.gate.stop_accepting();
        let drained = self.gate.drain(drain_timeout);
        if drained {
            log::info!("all in-flight requests finished");
        }
        drained
    }
}

fn error_response(err: &OverlayError) -> Value {
    json!({ "status": "error", "code": err.code(), "message": err.to_string() })
}
