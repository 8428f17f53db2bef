/// Device protocol: framing, transport and the acknowledgment handshake.
///
/// ```text
///   Vec<RegisterValue>
///        │ command: 64-value Z blocks
///        ▼
///   ┌──────────┐   observers: transcript, console echo
///   │ session  │──────────────────────────────────────►
///   └──────────┘
///        │ Idle ⇄ AwaitingAck, OVER round-trip
///        ▼
///   ┌───────────┐
///   │ transport │  serial line, or none for a dry run
///   └───────────┘
/// ```

pub mod command;
pub mod observer;
pub mod session;
pub mod transport;
