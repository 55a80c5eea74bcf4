use super::{InboundMessage, RtmpSession};
use crate::lock;
use crate::messages::CommandMessage;
use rtmp_amf0::Amf0Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of an application procedure, sent back to the peer in an `_error` reply
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RpcError {
    #[error("No procedure named '{procedure}'")]
    UnknownProcedure { procedure: String },

    #[error("{code}: {description}")]
    Failed { code: String, description: String },
}

impl RpcError {
    pub fn code(&self) -> &str {
        match self {
            RpcError::UnknownProcedure { .. } => "NetConnection.Call.Failed",
            RpcError::Failed { code, .. } => code,
        }
    }
}

/// Where a call came from
pub struct RpcContext<'a> {
    pub session: &'a Arc<RtmpSession>,
    pub message_stream_id: u32,
}

/// Application logic bound to an RTMP app name.
///
/// Commands the session does not handle itself are passed to `invoke`.  Media and data
/// messages arriving on a NetStream are passed to `on_stream_message`.
pub trait RtmpController: Send + Sync {
    /// `Ok(Some(value))` replies `_result` with `value`, `Ok(None)` replies `_result` with null
    fn invoke(
        &self,
        context: &RpcContext<'_>,
        command: &CommandMessage,
    ) -> Result<Option<Amf0Value>, RpcError>;

    fn on_stream_message(&self, _context: &RpcContext<'_>, _message: &InboundMessage) {}
}

/// Calls into the connected app's controller and builds the reply
#[derive(Clone)]
pub struct RpcService {
    controller: Arc<dyn RtmpController>,
}

impl RpcService {
    pub fn new(controller: Arc<dyn RtmpController>) -> RpcService {
        RpcService { controller }
    }

    pub fn controller(&self) -> &Arc<dyn RtmpController> {
        &self.controller
    }

    /// Runs the procedure named by `command`.  Returns the reply to send, or `None` when the
    /// caller did not ask for one (transaction id 0).  A panicking procedure is reported to
    /// the peer as a failed call.
    pub fn call(&self, context: &RpcContext<'_>, command: &CommandMessage) -> Option<CommandMessage> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.controller.invoke(context, command)));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(procedure = %command.procedure_name, "Procedure panicked");
                Err(RpcError::Failed {
                    code: "NetConnection.Call.Failed".to_string(),
                    description: format!("Procedure '{}' failed", command.procedure_name),
                })
            }
        };

        if command.transaction_id == 0.0 {
            if let Err(error) = outcome {
                debug!(procedure = %command.procedure_name, %error, "Call without reply failed");
            }

            return None;
        }

        let reply = match outcome {
            Ok(value) => CommandMessage::result(
                command.transaction_id,
                Amf0Value::Null,
                value.unwrap_or(Amf0Value::Null),
            ),

            Err(error) => {
                CommandMessage::error(command.transaction_id, error.code(), &error.to_string())
            }
        };

        Some(reply.with_encoding(command.encoding))
    }
}

/// Controllers by app name, shared by every connection of a server
#[derive(Default)]
pub struct Applications {
    controllers: Mutex<HashMap<String, Arc<dyn RtmpController>>>,
}

impl Applications {
    pub fn new() -> Applications {
        Applications::default()
    }

    /// Replaces any controller already bound to `app`
    pub fn register(&self, app: &str, controller: Arc<dyn RtmpController>) {
        lock(&self.controllers).insert(normalize(app).to_string(), controller);
    }

    pub fn get(&self, app: &str) -> Option<Arc<dyn RtmpController>> {
        lock(&self.controllers).get(normalize(app)).cloned()
    }
}

fn normalize(app: &str) -> &str {
    app.trim_end_matches('/')
}
