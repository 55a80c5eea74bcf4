//! Session multiplexing above the chunk layer.
//!
//! An [`RtmpSession`] exists per connection.  It owns the connection's message streams, each of
//! which routes messages to one handler per message type, and hands out chunk stream ids for
//! outbound traffic.  Message stream 0 carries the NetConnection commands (`connect`,
//! `createStream`, `deleteStream`, `close`); `createStream` opens a [`NetStream`] whose
//! commands and media are passed to the application's [`RtmpController`].

mod chunk_stream;
mod config;
mod control;
mod errors;
mod message_stream;
mod net_connection;
mod net_stream;
mod registry;
mod rpc;
mod session;


pub use self::chunk_stream::ChunkStream;
pub use self::config::ServerConfig;
pub use self::control::ControlProtocol;
pub use self::errors::SessionError;
pub use self::message_stream::{InboundMessage, MessageHandler, MessageStream};
pub use self::net_connection::ConnectionInformation;
pub use self::net_stream::NetStream;
pub use self::registry::{StreamRegistry, CONTROL_MESSAGE_STREAM_ID};
pub use self::rpc::{Applications, RpcContext, RpcError, RpcService, RtmpController};
pub use self::session::RtmpSession;
