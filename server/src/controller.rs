use rtmp_amf0::Amf0Value;
use rtmp_mux::messages::{status_object, CommandMessage, RtmpMessage, UserControlEvent};
use rtmp_mux::sessions::{InboundMessage, RpcContext, RpcError, RtmpController};
use rtmp_mux::time::RtmpTimestamp;
use tracing::{debug, info, warn};

/// Accepts every publish and play request and logs what flows through the stream.  Media is
/// not relayed anywhere.
pub struct LoggingController {
    app: String,
}

impl LoggingController {
    pub fn new(app: &str) -> LoggingController {
        LoggingController {
            app: app.to_string(),
        }
    }

    fn send_status(&self, context: &RpcContext<'_>, code: &str, description: &str) {
        let stream = match context.session.net_stream(context.message_stream_id) {
            Some(stream) => stream,
            None => return,
        };

        let mut status = CommandMessage::new("onStatus", 0.0, Amf0Value::Null);
        status.arguments.push(status_object("status", code, description));

        let begin = UserControlEvent::StreamBegin {
            stream_id: context.message_stream_id,
        };

        let sent = context
            .session
            .send_control(&RtmpMessage::UserControl(begin))
            .and_then(|_| stream.send(RtmpTimestamp::new(0), &RtmpMessage::Command(status)));

        if let Err(error) = sent {
            warn!(app = %self.app, %error, "Failed to send stream status");
        }
    }
}

impl RtmpController for LoggingController {
    fn invoke(
        &self,
        context: &RpcContext<'_>,
        command: &CommandMessage,
    ) -> Result<Option<Amf0Value>, RpcError> {
        let stream_key = command
            .arguments
            .first()
            .and_then(Amf0Value::as_str)
            .unwrap_or_default()
            .to_string();

        match command.procedure_name.as_str() {
            "publish" => {
                info!(app = %self.app, stream_key = %stream_key, "Publish started");
                self.send_status(context, "NetStream.Publish.Start", "Publishing started.");
                Ok(None)
            }

            "play" => {
                info!(app = %self.app, stream_key = %stream_key, "Play started");
                self.send_status(context, "NetStream.Play.Start", "Playback started.");
                Ok(None)
            }

            "releaseStream" | "FCPublish" | "FCUnpublish" | "getStreamLength" => Ok(None),

            other => Err(RpcError::UnknownProcedure {
                procedure: other.to_string(),
            }),
        }
    }

    fn on_stream_message(&self, context: &RpcContext<'_>, message: &InboundMessage) {
        let size = match &message.message {
            RtmpMessage::AudioData { data } | RtmpMessage::VideoData { data } => data.len(),
            _ => 0,
        };

        debug!(
            app = %self.app,
            connection_id = context.session.connection_id(),
            msid = message.message_stream_id,
            timestamp = %message.timestamp,
            message_type = %message.message.message_type(),
            size,
            "Stream message"
        );
    }
}
