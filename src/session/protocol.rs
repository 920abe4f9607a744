// Session wire protocol
//
// JSON messages tagged by `"type"`. Client messages are parsed and
// validated here so the state machine only ever sees well-formed input.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ErrorCode, SessionError};
use crate::model::{BandPoint, Curve};

/// One `{freq, vol}` entry of a batched submission
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Submission {
    pub freq: f64,
    pub vol: f64,
}

/// Messages accepted from the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartTest {
        /// Required key; `null` selects the host's default output
        #[serde(deserialize_with = "Option::deserialize")]
        device_id: Option<u32>,
        root_freq: f64,
        root_volume: f64,
        #[serde(default)]
        seed_count: Option<usize>,
    },
    SubmitVolume {
        frequency: f64,
        volume: f64,
    },
    SubmitVolumes {
        submissions: Vec<Submission>,
    },
    PlayTone {
        frequency: f64,
        volume: f64,
    },
    PlayReference {},
    GetCurve {},
    Reset {},
}

impl ClientMessage {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StartTest { .. } => "start_test",
            ClientMessage::SubmitVolume { .. } => "submit_volume",
            ClientMessage::SubmitVolumes { .. } => "submit_volumes",
            ClientMessage::PlayTone { .. } => "play_tone",
            ClientMessage::PlayReference {} => "play_reference",
            ClientMessage::GetCurve {} => "get_curve",
            ClientMessage::Reset {} => "reset",
        }
    }

    /// Whether handling this message may refit the model
    pub fn may_fit(&self) -> bool {
        matches!(
            self,
            ClientMessage::SubmitVolume { .. } | ClientMessage::SubmitVolumes { .. }
        )
    }

    /// Field-level checks serde cannot express
    pub fn validate(&self) -> Result<(), SessionError> {
        match self {
            ClientMessage::StartTest {
                root_freq,
                root_volume,
                ..
            } => {
                check_frequency("root_freq", *root_freq)?;
                check_volume("root_volume", *root_volume)
            }
            ClientMessage::SubmitVolume { frequency, volume }
            | ClientMessage::PlayTone { frequency, volume } => {
                check_frequency("frequency", *frequency)?;
                check_volume("volume", *volume)
            }
            ClientMessage::SubmitVolumes { submissions } => {
                if submissions.is_empty() {
                    return Err(invalid("submissions must not be empty"));
                }
                for s in submissions {
                    check_frequency("freq", s.freq)?;
                    check_volume("vol", s.vol)?;
                }
                Ok(())
            }
            ClientMessage::PlayReference {} | ClientMessage::GetCurve {} | ClientMessage::Reset {} => {
                Ok(())
            }
        }
    }
}

fn invalid(reason: impl Into<String>) -> SessionError {
    SessionError::InvalidInput {
        reason: reason.into(),
    }
}

fn check_frequency(field: &str, value: f64) -> Result<(), SessionError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be a positive finite number", field)))
    }
}

fn check_volume(field: &str, value: f64) -> Result<(), SessionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{} must be finite", field)))
    }
}

/// Parse and validate one client text frame
pub fn parse_client_message(text: &str) -> Result<ClientMessage, SessionError> {
    let message: ClientMessage = serde_json::from_str(text)?;
    message.validate()?;
    Ok(message)
}

/// `{band: frequency}` in band order
fn serialize_band_points<S: Serializer>(points: &[BandPoint], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(points.len()))?;
    for point in points {
        map.serialize_entry(&point.band, &point.frequency_hz)?;
    }
    map.end()
}

/// Messages sent to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TestStarted {
        seed_count: usize,
    },
    NewPoint {
        frequency: f64,
    },
    NewPoints {
        #[serde(serialize_with = "serialize_band_points")]
        points: Vec<BandPoint>,
    },
    UpdateCurve {
        data: Curve,
    },
    Error {
        code: i32,
        message: String,
    },
}

impl ServerMessage {
    pub fn from_error<E: ErrorCode>(err: &E) -> Self {
        ServerMessage::Error {
            code: err.code(),
            message: err.message(),
        }
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(|err| SessionError::Internal {
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionErrorCodes;

    #[test]
    fn test_parse_start_test_seed_count_is_optional() {
        let msg = parse_client_message(
            r#"{"type":"start_test","device_id":3,"root_freq":1000,"root_volume":-25}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartTest {
                device_id: Some(3),
                root_freq: 1000.0,
                root_volume: -25.0,
                seed_count: None,
            }
        );

        let default_output = parse_client_message(
            r#"{"type":"start_test","device_id":null,"root_freq":500,"root_volume":-30,"seed_count":4}"#,
        )
        .unwrap();
        assert!(matches!(
            default_output,
            ClientMessage::StartTest {
                device_id: None,
                seed_count: Some(4),
                ..
            }
        ));
    }

    #[test]
    fn test_start_test_requires_device_and_root() {
        for text in [
            r#"{"type":"start_test"}"#,
            r#"{"type":"start_test","seed_count":2}"#,
            r#"{"type":"start_test","root_freq":1000,"root_volume":-25}"#,
            r#"{"type":"start_test","device_id":1,"root_volume":-25}"#,
            r#"{"type":"start_test","device_id":1,"root_freq":1000}"#,
            r#"{"type":"start_test","device_id":1,"root_freq":-5,"root_volume":-25}"#,
        ] {
            let err = parse_client_message(text).unwrap_err();
            assert_eq!(err.code(), SessionErrorCodes::INVALID_INPUT, "{}", text);
        }
    }

    #[test]
    fn test_parse_batched_submission() {
        let msg = parse_client_message(
            r#"{"type":"submit_volumes","submissions":[{"freq":120,"vol":-30},{"freq":6000,"vol":-12.5}]}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SubmitVolumes { submissions } => {
                assert_eq!(submissions.len(), 2);
                assert_eq!(submissions[1].vol, -12.5);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unit_messages_accept_bare_type() {
        assert_eq!(
            parse_client_message(r#"{"type":"get_curve"}"#).unwrap(),
            ClientMessage::GetCurve {}
        );
        assert_eq!(
            parse_client_message(r#"{"type":"reset"}"#).unwrap().kind(),
            "reset"
        );
    }

    #[test]
    fn test_malformed_messages_are_invalid_input() {
        for text in [
            "{not json",
            r#"{"type":"dance"}"#,
            r#"{"type":"submit_volume","frequency":500}"#,
            r#"{"type":"submit_volumes","submissions":[]}"#,
            r#"{"type":"submit_volume","frequency":-5,"volume":-10}"#,
            r#"{"type":"play_tone","frequency":0,"volume":-10}"#,
            r#"{"frequency":500,"volume":-10}"#,
        ] {
            let err = parse_client_message(text).unwrap_err();
            assert_eq!(err.code(), SessionErrorCodes::INVALID_INPUT, "{}", text);
        }
    }

    #[test]
    fn test_new_points_preserve_band_order() {
        let msg = ServerMessage::NewPoints {
            points: vec![
                BandPoint::new("low", 120.0),
                BandPoint::new("mid", 750.0),
                BandPoint::new("high", 6000.0),
            ],
        };
        let json = msg.to_json().unwrap();
        assert!(json.starts_with(r#"{"type":"new_points","points":{"#));
        let low = json.find("\"low\"").unwrap();
        let mid = json.find("\"mid\"").unwrap();
        let high = json.find("\"high\"").unwrap();
        assert!(low < mid && mid < high);
    }

    #[test]
    fn test_error_message_shape() {
        let err = SessionError::InvalidInput {
            reason: "bad".to_string(),
        };
        let value = serde_json::to_value(ServerMessage::from_error(&err)).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], 3001);
        assert_eq!(value["message"], "Invalid input: bad");
    }

    #[test]
    fn test_update_curve_wraps_data() {
        let value = serde_json::to_value(ServerMessage::UpdateCurve {
            data: Curve::empty(),
        })
        .unwrap();
        assert_eq!(value["type"], "update_curve");
        assert_eq!(value["data"]["points"], serde_json::json!([]));
    }
}
