/// Inputs to the subscription state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Consumer asked for the stream to start.
    Subscribe,
    /// Transport accepted the connection.
    TransportOpened,
    /// Raw event payload from the transport.
    Payload(String),
    /// Connection dropped, refused, or ended without a terminal status.
    TransportFailed { reason: String },
    /// Pending reconnect delay ran out.
    BackoffElapsed,
    /// Consumer tore the subscription down.
    Cancel,
}
