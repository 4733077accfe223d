//! Messages sent from the relay to clients.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use tapscore_core::{Handle, Score};

use crate::ProtocolError;

/// Messages sent from the relay to clients.
///
/// Serialized externally tagged, so each message becomes a single-key
/// object: `{"claim":{"by":"p0","score":5}}`, `{"add":3}`, `{"best":10}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    /// A peer asked everyone else for points
    Claim {
        /// Handle of the claimant
        by: Handle,
        /// Claimant's score at the time of the claim
        score: Score,
    },

    /// Instructs the receiving client to add this amount to its score.
    ///
    /// The amount is forwarded exactly as the giver sent it.
    Add(Number),

    /// Highest score among recently active clients
    Best(Score),
}

impl ServerMessage {
    /// Creates a claim broadcast.
    pub fn claim(by: Handle, score: Score) -> Self {
        Self::Claim { by, score }
    }

    /// Creates an add instruction.
    pub fn add(amount: impl Into<Number>) -> Self {
        Self::Add(amount.into())
    }

    /// Creates a best-score broadcast.
    pub fn best(score: Score) -> Self {
        Self::Best(score)
    }

    /// Encodes the message as a text frame.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Short name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "claim",
            Self::Add(_) => "add",
            Self::Best(_) => "best",
        }
    }
}
