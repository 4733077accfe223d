//! Decoding of client frames.
//!
//! A frame that is not a JSON object fails as a whole with a
//! [`ProtocolError`]. Inside a valid frame each action is decoded on its
//! own: a recognized action with a bad payload becomes
//! [`ClientAction::Invalid`] and does not spoil its siblings.

use serde_json::{Map, Number, Value};
use tapscore_core::{coerce_score, Handle, Score};
use thiserror::Error;

/// Errors raised while decoding or encoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame is valid JSON but not an object of actions.
    #[error("frame must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// An outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// One action decoded from a client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// `score: <number>` - the client's current score
    Score(Score),

    /// `claimPoints: <anything>` - ask every other client for points
    ClaimPoints,

    /// `give: {to, amount}` - send points to one peer
    Give {
        /// Handle of the receiving peer
        to: Handle,
        /// Amount to forward, untouched
        amount: Number,
    },

    /// An action name the relay does not know
    Unknown {
        /// The unrecognized key
        action: String,
    },

    /// A known action whose payload could not be decoded
    Invalid {
        /// The action name
        action: String,
        /// What was wrong with the payload
        reason: String,
    },
}

impl ClientAction {
    /// Wire name of the action.
    pub fn name(&self) -> &str {
        match self {
            Self::Score(_) => "score",
            Self::ClaimPoints => "claimPoints",
            Self::Give { .. } => "give",
            Self::Unknown { action } | Self::Invalid { action, .. } => action,
        }
    }
}

/// A decoded client frame: the actions it carried, in the order the client
/// wrote the keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientFrame {
    actions: Vec<ClientAction>,
}

impl ClientFrame {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Malformed` if the text is not JSON
    /// - `ProtocolError::NotAnObject` if the JSON is not an object
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(ProtocolError::NotAnObject(json_kind(&other))),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let actions = map
            .into_iter()
            .map(|(action, payload)| decode_action(action, &payload))
            .collect();
        Self { actions }
    }

    /// Actions carried by the frame.
    pub fn actions(&self) -> &[ClientAction] {
        &self.actions
    }

    /// Returns true if the frame carried no keys at all.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl IntoIterator for ClientFrame {
    type Item = ClientAction;
    type IntoIter = std::vec::IntoIter<ClientAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

fn decode_action(action: String, payload: &Value) -> ClientAction {
    match action.as_str() {
        "score" => match coerce_score(payload) {
            Ok(score) => ClientAction::Score(score),
            Err(e) => ClientAction::Invalid {
                action,
                reason: e.to_string(),
            },
        },
        "claimPoints" => ClientAction::ClaimPoints,
        "give" => match decode_give(payload) {
            Ok((to, amount)) => ClientAction::Give { to, amount },
            Err(reason) => ClientAction::Invalid { action, reason },
        },
        _ => ClientAction::Unknown { action },
    }
}

fn decode_give(payload: &Value) -> Result<(Handle, Number), String> {
    let fields = payload
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", json_kind(payload)))?;

    let to = match fields.get("to") {
        Some(Value::String(s)) => Handle::new(s.as_str()),
        Some(other) => return Err(format!("`to` must be a handle string, got {}", json_kind(other))),
        None => return Err("missing `to`".to_string()),
    };

    let amount = match fields.get("amount") {
        Some(Value::Number(n)) => n.clone(),
        Some(other) => return Err(format!("`amount` must be a number, got {}", json_kind(other))),
        None => return Err("missing `amount`".to_string()),
    };

    Ok((to, amount))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        let frame = ClientFrame::parse(r#"{"score": 5}"#).unwrap();
        assert_eq!(frame.actions(), &[ClientAction::Score(5)]);
    }

    #[test]
    fn test_claim_points_payload_ignored() {
        for text in [r#"{"claimPoints": true}"#, r#"{"claimPoints": null}"#, r#"{"claimPoints": {"x": 1}}"#] {
            let frame = ClientFrame::parse(text).unwrap();
            assert_eq!(frame.actions(), &[ClientAction::ClaimPoints], "{text}");
        }
    }

    #[test]
    fn test_parse_give() {
        let frame = ClientFrame::parse(r#"{"give": {"to": "p1", "amount": 3}}"#).unwrap();
        assert_eq!(
            frame.actions(),
            &[ClientAction::Give {
                to: Handle::from_sequence(1),
                amount: Number::from(3),
            }]
        );
    }

    #[test]
    fn test_give_amount_passes_through_unvalidated() {
        let frame = ClientFrame::parse(r#"{"give": {"to": "p1", "amount": -2.5}}"#).unwrap();
        match frame.actions() {
            [ClientAction::Give { amount, .. }] => assert_eq!(amount.as_f64(), Some(-2.5)),
            other => panic!("expected give, got {other:?}"),
        }
    }

    #[test]
    fn test_actions_keep_frame_order() {
        let frame =
            ClientFrame::parse(r#"{"score": 9, "claimPoints": true, "dance": 1}"#).unwrap();
        let names: Vec<&str> = frame.actions().iter().map(ClientAction::name).collect();
        assert_eq!(names, ["score", "claimPoints", "dance"]);

        let frame = ClientFrame::parse(r#"{"claimPoints": true, "score": 9}"#).unwrap();
        assert_eq!(
            frame.actions(),
            &[ClientAction::ClaimPoints, ClientAction::Score(9)]
        );
    }

    #[test]
    fn test_unknown_action() {
        let frame = ClientFrame::parse(r#"{"teleport": {"x": 1}}"#).unwrap();
        assert_eq!(
            frame.actions(),
            &[ClientAction::Unknown {
                action: "teleport".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_payload_does_not_spoil_siblings() {
        let frame = ClientFrame::parse(r#"{"give": {"amount": 3}, "score": 4}"#).unwrap();
        assert!(frame.actions().contains(&ClientAction::Score(4)));
        assert!(frame.actions().iter().any(|a| matches!(
            a,
            ClientAction::Invalid { action, reason } if action == "give" && reason.contains("`to`")
        )));
    }

    #[test]
    fn test_invalid_give_shapes() {
        for text in [
            r#"{"give": 3}"#,
            r#"{"give": {"to": 1, "amount": 3}}"#,
            r#"{"give": {"to": "p1"}}"#,
            r#"{"give": {"to": "p1", "amount": "3"}}"#,
        ] {
            let frame = ClientFrame::parse(text).unwrap();
            assert!(
                matches!(frame.actions(), [ClientAction::Invalid { .. }]),
                "{text} should be invalid"
            );
        }
    }

    #[test]
    fn test_invalid_score() {
        let frame = ClientFrame::parse(r#"{"score": "many"}"#).unwrap();
        assert!(matches!(frame.actions(), [ClientAction::Invalid { action, .. }] if action == "score"));
    }

    #[test]
    fn test_malformed_json() {
        let err = ClientFrame::parse("{score: 5").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_non_object_frames() {
        assert_eq!(
            ClientFrame::parse("[1,2]").unwrap_err(),
            ProtocolError::NotAnObject("array")
        );
        assert_eq!(
            ClientFrame::parse("5").unwrap_err(),
            ProtocolError::NotAnObject("number")
        );
    }

    #[test]
    fn test_empty_object() {
        let frame = ClientFrame::parse("{}").unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.into_iter().count(), 0);
    }
}
