use super::rpc::{RpcContext, RpcService};
use super::{InboundMessage, MessageHandler, MessageStream, RtmpSession, SessionError};
use crate::messages::{status_object, CommandMessage, MessageType, PeerBandwidthLimitType, RtmpMessage};
use rtmp_amf0::Amf0Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the client announced in its `connect` command object
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInformation {
    pub app: String,
    pub tc_url: Option<String>,
    pub flash_version: Option<String>,
    pub object_encoding: f64,

    /// Every property of the command object, including the ones above
    pub properties: HashMap<String, Amf0Value>,
}

impl ConnectionInformation {
    /// `None` when the command object has no string `app` property
    pub fn from_command_object(command_object: &Amf0Value) -> Option<ConnectionInformation> {
        let properties = command_object.as_object()?.clone();
        let mut app = properties.get("app")?.as_str()?.to_string();
        if app.ends_with('/') {
            app.pop();
        }

        let text = |name: &str| {
            properties
                .get(name)
                .and_then(Amf0Value::as_str)
                .map(str::to_string)
        };

        Some(ConnectionInformation {
            app,
            tc_url: text("tcUrl"),
            flash_version: text("flashVer"),
            object_encoding: properties
                .get("objectEncoding")
                .and_then(Amf0Value::as_number)
                .unwrap_or(0.0),
            properties,
        })
    }
}

/// Handles commands on the control message stream
struct NetConnection;

pub(super) fn register_handlers(control: &MessageStream) -> Result<(), SessionError> {
    let handler: Arc<dyn MessageHandler> = Arc::new(NetConnection);
    control.register_handler(MessageType::Amf0Command, handler.clone())?;
    control.register_handler(MessageType::Amf3Command, handler)?;
    Ok(())
}

impl MessageHandler for NetConnection {
    fn handle(&self, session: &Arc<RtmpSession>, message: InboundMessage) -> Result<(), SessionError> {
        let command = match message.message {
            RtmpMessage::Command(command) => command,
            _ => return Ok(()),
        };

        debug!(
            connection_id = session.connection_id(),
            procedure = %command.procedure_name,
            transaction_id = command.transaction_id,
            "NetConnection command received"
        );

        match command.procedure_name.as_str() {
            "connect" => connect(session, &command),
            "createStream" => create_stream(session, &command),
            "deleteStream" => delete_stream(session, &command),
            "close" => {
                session.close();
                Ok(())
            }

            _ => call(session, &command),
        }
    }
}

fn connect(session: &Arc<RtmpSession>, command: &CommandMessage) -> Result<(), SessionError> {
    if session.connection_information().is_some() {
        let reply = CommandMessage::error(
            command.transaction_id,
            "NetConnection.Connect.Rejected",
            "Connection already established",
        );

        return reply_on_control(session, command, reply);
    }

    let information = match ConnectionInformation::from_command_object(&command.command_object) {
        Some(information) => information,
        None => {
            warn!(
                connection_id = session.connection_id(),
                "Connect request did not name an app"
            );
            session.close();
            return Ok(());
        }
    };

    let controller = match session.applications().get(&information.app) {
        Some(controller) => controller,
        None => {
            warn!(
                connection_id = session.connection_id(),
                app = %information.app,
                "Connect request for unknown app"
            );
            session.close();
            return Ok(());
        }
    };

    let app = information.app.clone();
    let object_encoding = information.object_encoding;
    if !session.set_connection(information, RpcService::new(controller)) {
        return Ok(());
    }

    let config = session.config();
    session.send_control(&RtmpMessage::WindowAcknowledgementSize {
        size: config.window_ack_size,
    })?;
    session.send_control(&RtmpMessage::SetPeerBandwidth {
        size: config.peer_bandwidth,
        limit_type: PeerBandwidthLimitType::Dynamic,
    })?;
    session.set_write_chunk_size(config.chunk_size)?;

    let mut properties = HashMap::new();
    properties.insert("fmsVer".to_string(), Amf0Value::Utf8String(config.fms_version.clone()));
    properties.insert("capabilities".to_string(), Amf0Value::Number(31.0));
    properties.insert("mode".to_string(), Amf0Value::Number(1.0));

    let mut status = status_object("status", "NetConnection.Connect.Success", "Connection succeeded.")
        .into_object()
        .unwrap_or_default();
    status.insert("objectEncoding".to_string(), Amf0Value::Number(object_encoding));

    let reply = CommandMessage::result(
        command.transaction_id,
        Amf0Value::Object(properties),
        Amf0Value::Object(status),
    );

    reply_on_control(session, command, reply)?;
    info!(connection_id = session.connection_id(), app = %app, "Client connected");
    Ok(())
}

fn create_stream(session: &Arc<RtmpSession>, command: &CommandMessage) -> Result<(), SessionError> {
    if session.connection_information().is_none() {
        let reply = CommandMessage::error(
            command.transaction_id,
            "NetConnection.CreateStream.Failed",
            "Not connected",
        );

        return reply_on_control(session, command, reply);
    }

    let reply = match session.create_net_stream() {
        Ok(stream) => CommandMessage::result(
            command.transaction_id,
            Amf0Value::Null,
            Amf0Value::Number(stream.id() as f64),
        ),

        Err(error) => {
            warn!(connection_id = session.connection_id(), %error, "Failed to create stream");
            CommandMessage::error(
                command.transaction_id,
                "NetConnection.CreateStream.Failed",
                &error.to_string(),
            )
        }
    };

    reply_on_control(session, command, reply)
}

fn delete_stream(session: &Arc<RtmpSession>, command: &CommandMessage) -> Result<(), SessionError> {
    let stream_id = match command.arguments.first().and_then(Amf0Value::as_number) {
        Some(id) => id as u32,
        None => return Ok(()),
    };

    if !session.delete_net_stream(stream_id) {
        debug!(
            connection_id = session.connection_id(),
            msid = stream_id,
            "deleteStream for a stream that is not open"
        );
    }

    Ok(())
}

fn call(session: &Arc<RtmpSession>, command: &CommandMessage) -> Result<(), SessionError> {
    let rpc = match session.rpc_service() {
        Some(rpc) => rpc,
        None => {
            if command.transaction_id == 0.0 {
                return Ok(());
            }

            let reply = CommandMessage::error(
                command.transaction_id,
                "NetConnection.Call.Failed",
                "Not connected",
            );

            return reply_on_control(session, command, reply);
        }
    };

    let context = RpcContext {
        session,
        message_stream_id: 0,
    };

    match rpc.call(&context, command) {
        Some(reply) => reply_on_control(session, command, reply),
        None => Ok(()),
    }
}

fn reply_on_control(
    session: &RtmpSession,
    request: &CommandMessage,
    reply: CommandMessage,
) -> Result<(), SessionError> {
    let reply = reply.with_encoding(request.encoding);
    session.send_control(&RtmpMessage::Command(reply))?;
    Ok(())
}
