//! Stagewatch engine: task event streams over HTTP and their lifecycle driver.
mod connection;
mod engine;
mod sse;
mod transport;
mod types;

pub use connection::{
    tokio_delay, ChannelStreamSink, DelayFn, Health, StreamConnection, StreamSink, Subscription,
};
pub use engine::EngineHandle;
pub use transport::{EventTransport, PayloadStream, ReqwestTransport};
pub use types::{EngineEvent, EngineStopped, StreamSettings, TransportError, TransportErrorKind};
