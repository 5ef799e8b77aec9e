//! Newline-delimited JSON message protocol spoken over the interpreter
//! subprocess's stdio. Modeled on the Jupyter kernel message types the
//! original `dasa.notebook.kernel.KernelManager` consumes (`stream`,
//! `execute_result`/`display_data`, `error`, `status`), but framed as plain
//! JSON lines instead of ZeroMQ multipart messages since our child process
//! talks over stdin/stdout rather than a message bus.

use serde::{Deserialize, Serialize};

/// A code submission sent to the interpreter subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub code: String,
}

/// One line of output from the interpreter subprocess, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg_type")]
pub enum KernelMessage {
    #[serde(rename = "stream")]
    Stream { id: String, name: StreamName, text: String },
    #[serde(rename = "execute_result")]
    ExecuteResult { id: String, data: String },
    #[serde(rename = "display_data")]
    DisplayData { id: String, data: String },
    #[serde(rename = "error")]
    Error {
        id: String,
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    #[serde(rename = "status")]
    Status { id: String, state: ExecutionState },
    #[serde(rename = "ready")]
    Ready,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Busy,
    Idle,
}

pub fn encode_submission(sub: &Submission) -> String {
    serde_json::to_string(sub).unwrap_or_default()
}

pub fn decode_message(line: &str) -> Option<KernelMessage> {
    serde_json::from_str(line).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_stream_message() {
        let line = r#"{"msg_type":"stream","id":"abc","name":"stdout","text":"hi\n"}"#;
        let msg = decode_message(line).unwrap();
        match msg {
            KernelMessage::Stream { id, name, text } => {
                assert_eq!(id, "abc");
                assert_eq!(name, StreamName::Stdout);
                assert_eq!(text, "hi\n");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn encodes_submission() {
        let sub = Submission {
            id: "1".to_string(),
            code: "x = 1".to_string(),
        };
        let line = encode_submission(&sub);
        assert!(line.contains("\"code\":\"x = 1\""));
    }

    #[test]
    fn unparseable_line_decodes_to_none() {
        assert!(decode_message("not json").is_none());
    }
}
