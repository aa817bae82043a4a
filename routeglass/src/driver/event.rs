//! Streaming execution events.

use serde::Serialize;

use crate::transport::ExitStatus;

/// One step of a streaming execution.
///
/// A sink sees `Start`, any number of `Data`, then exactly one terminal
/// event (`Error` or `Complete`). When the command never started, the
/// terminal `Error` is the only event.
///
/// Serialized as `{"type":"start","command":...}`, `{"type":"data","data":...}`,
/// `{"type":"error","error":...}`, `{"type":"complete"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecutionEvent {
    /// The command is running on the device.
    Start { command: String },
    /// One filtered output line.
    Data { data: String },
    /// The execution failed or timed out.
    Error { error: String },
    /// The command finished and all output has been delivered.
    Complete {
        #[serde(rename = "exitStatus", skip_serializing_if = "Option::is_none")]
        exit_status: Option<ExitStatus>,
    },
}

impl ExecutionEvent {
    /// Whether this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionEvent::Error { .. } | ExecutionEvent::Complete { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let events = [
            ExecutionEvent::Start {
                command: "show bgp summary".into(),
            },
            ExecutionEvent::Data {
                data: "Groups: 3 Peers: 12".into(),
            },
            ExecutionEvent::Error {
                error: "Command timeout after 300s".into(),
            },
            ExecutionEvent::Complete { exit_status: None },
            ExecutionEvent::Complete {
                exit_status: Some(ExitStatus::Code(1)),
            },
        ];
        let values: Vec<_> = events
            .iter()
            .map(|e| serde_json::to_value(e).unwrap())
            .collect();
        assert_eq!(
            values,
            [
                json!({"type": "start", "command": "show bgp summary"}),
                json!({"type": "data", "data": "Groups: 3 Peers: 12"}),
                json!({"type": "error", "error": "Command timeout after 300s"}),
                json!({"type": "complete"}),
                json!({"type": "complete", "exitStatus": 1}),
            ]
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(!ExecutionEvent::Start { command: "x".into() }.is_terminal());
        assert!(!ExecutionEvent::Data { data: "x".into() }.is_terminal());
        assert!(ExecutionEvent::Error { error: "x".into() }.is_terminal());
        assert!(ExecutionEvent::Complete { exit_status: None }.is_terminal());
    }
}
