//! Client → server socket frames

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join { conversation_id: String },
    Leave { conversation_id: String },
    SendMessage { conversation_id: String, body: String },
    Typing { conversation_id: String },
    MarkRead { conversation_id: String },
    Ping,
}

/// Parse a text frame; the error string is sent back to the client
pub fn parse_frame(text: &str) -> Result<ClientFrame, String> {
    serde_json::from_str(text).map_err(|e| format!("Malformed frame: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        let frame = parse_frame(r#"{"type":"join","conversation_id":"c1"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Join {
                conversation_id: "c1".into()
            }
        );
    }

    #[test]
    fn test_parse_send_message() {
        let frame = parse_frame(r#"{"type":"send_message","conversation_id":"c1","body":"Salut"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::SendMessage { body, .. } if body == "Salut"));
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(parse_frame(r#"{"type":"ping"}"#).unwrap(), ClientFrame::Ping);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"type":"dance"}"#).is_err());
        assert!(parse_frame(r#"{"type":"join"}"#).is_err());
    }
}
