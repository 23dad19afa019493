//! Trade streaming service.
//!
//! Re-streams persisted trades to subscribers over a two-channel TCP
//! transport: a control channel for open/close requests and a shared
//! data channel the forwarder fans out to every subscriber. Publishing
//! for a stream is gated on heartbeat liveness and paced by the
//! scanner's acknowledgement protocol.

pub mod error;
pub mod forwarder;
pub mod heartbeat;
pub mod message;
pub mod registry;
pub mod service;

pub use error::{StreamError, StreamResult};
pub use forwarder::Forwarder;
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatTracker};
pub use message::{ControlReply, ControlRequest, PayloadMessage, StreamId, SubscriberMessage};
pub use registry::{StreamEntry, StreamRegistry};
pub use service::StreamingService;
