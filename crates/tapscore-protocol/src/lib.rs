//! tapscore protocol - wire format between browser clients and the relay
//!
//! Every frame is a UTF-8 JSON object whose top-level keys are action
//! names. One frame may carry several actions at once.
//!
//! - client → relay: `score`, `claimPoints`, `give` (see [`ClientFrame`])
//! - relay → client: `claim`, `add`, `best` (see [`ServerMessage`])

pub mod message;
pub mod parse;

pub use message::ServerMessage;
pub use parse::{ClientAction, ClientFrame, ProtocolError};
