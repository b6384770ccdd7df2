//! Clipboard monitoring of server-to-client instructions
//!
//! The remote side publishes clipboard data as a stream:
//!
//! ```text
//! clipboard <stream> <mimetype>
//! blob      <stream> <base64 data>   (repeated)
//! end       <stream>
//! ```
//!
//! [`MonitoringReader`] follows that stream as instructions pass through and
//! stores the completed contents in the session's [`ClipboardState`]. Every
//! instruction is handed to the caller unchanged.

use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, trace};
use tunnelgate_auth::clipboard::MAXIMUM_LENGTH;
use tunnelgate_auth::ClipboardState;
use tunnelgate_proto::Instruction;
use tunnelgate_transport::{InstructionReader, TunnelResult};

struct ClipboardStream {
    index: String,
    mimetype: String,
    data: Vec<u8>,
}

/// Reader that watches for clipboard streams
pub struct MonitoringReader {
    clipboard: Arc<ClipboardState>,
    inner: Box<dyn InstructionReader>,
    stream: Option<ClipboardStream>,
}

impl MonitoringReader {
    pub fn new(clipboard: Arc<ClipboardState>, inner: Box<dyn InstructionReader>) -> Self {
        Self {
            clipboard,
            inner,
            stream: None,
        }
    }

    fn inspect(&mut self, instruction: &Instruction) {
        match instruction.opcode.as_str() {
            "clipboard" => {
                let (Some(index), Some(mimetype)) = (instruction.arg(0), instruction.arg(1)) else {
                    return;
                };

                trace!(stream = %index, mimetype = %mimetype, "Clipboard stream started");
                self.stream = Some(ClipboardStream {
                    index: index.to_string(),
                    mimetype: mimetype.to_string(),
                    data: Vec::new(),
                });
            }
            "blob" => {
                let Some(stream) = self.stream.as_mut() else {
                    return;
                };
                if instruction.arg(0) != Some(stream.index.as_str()) {
                    return;
                }
                let Some(encoded) = instruction.arg(1) else {
                    return;
                };

                match base64::engine::general_purpose::STANDARD.decode(encoded) {
                    Ok(decoded) => {
                        let remaining = MAXIMUM_LENGTH.saturating_sub(stream.data.len());
                        stream
                            .data
                            .extend_from_slice(&decoded[..decoded.len().min(remaining)]);
                    }
                    Err(e) => {
                        debug!(stream = %stream.index, "Ignoring undecodable clipboard blob: {}", e);
                    }
                }
            }
            "end" => {
                let is_clipboard_stream = self
                    .stream
                    .as_ref()
                    .is_some_and(|stream| instruction.arg(0) == Some(stream.index.as_str()));
                if !is_clipboard_stream {
                    return;
                }

                if let Some(stream) = self.stream.take() {
                    debug!(
                        mimetype = %stream.mimetype,
                        length = stream.data.len(),
                        "Clipboard updated from remote"
                    );
                    self.clipboard.set_contents(stream.mimetype, stream.data);
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl InstructionReader for MonitoringReader {
    async fn read_instruction(&mut self) -> TunnelResult<Option<Instruction>> {
        let instruction = self.inner.read_instruction().await?;
        if let Some(instruction) = &instruction {
            self.inspect(instruction);
        }
        Ok(instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedReader {
        instructions: VecDeque<Instruction>,
    }

    #[async_trait]
    impl InstructionReader for ScriptedReader {
        async fn read_instruction(&mut self) -> TunnelResult<Option<Instruction>> {
            Ok(self.instructions.pop_front())
        }
    }

    fn reader(clipboard: &Arc<ClipboardState>, script: Vec<Instruction>) -> MonitoringReader {
        MonitoringReader::new(
            clipboard.clone(),
            Box::new(ScriptedReader {
                instructions: script.into(),
            }),
        )
    }

    async fn drain(reader: &mut MonitoringReader) -> Vec<Instruction> {
        let mut seen = Vec::new();
        while let Some(instruction) = reader.read_instruction().await.unwrap() {
            seen.push(instruction);
        }
        seen
    }

    #[tokio::test]
    async fn test_clipboard_stream_updates_state() {
        let clipboard = Arc::new(ClipboardState::new());
        let script = vec![
            Instruction::new("size", ["0", "1024", "768"]),
            Instruction::new("clipboard", ["3", "text/plain"]),
            Instruction::new("blob", ["3", "aGVsbG8g"]),
            Instruction::new("blob", ["3", "d29ybGQ="]),
            Instruction::new("end", ["3"]),
        ];

        let mut monitoring = reader(&clipboard, script.clone());
        let seen = drain(&mut monitoring).await;

        assert_eq!(seen, script, "instructions pass through unchanged");
        let contents = clipboard.snapshot();
        assert_eq!(contents.mimetype, "text/plain");
        assert_eq!(contents.data, b"hello world");
    }

    #[tokio::test]
    async fn test_other_streams_ignored() {
        let clipboard = Arc::new(ClipboardState::new());
        let script = vec![
            Instruction::new("clipboard", ["1", "text/plain"]),
            Instruction::new("blob", ["2", "aWdub3Jl"]),
            Instruction::new("blob", ["1", "a2VlcA=="]),
            Instruction::new("end", ["2"]),
        ];

        let mut monitoring = reader(&clipboard, script);
        drain(&mut monitoring).await;

        // Stream 1 never ended, so nothing is committed
        assert!(clipboard.snapshot().data.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_blob_skipped() {
        let clipboard = Arc::new(ClipboardState::new());
        let script = vec![
            Instruction::new("clipboard", ["0", "text/plain"]),
            Instruction::new("blob", ["0", "!!not base64!!"]),
            Instruction::new("blob", ["0", "b2s="]),
            Instruction::new("end", ["0"]),
        ];

        let mut monitoring = reader(&clipboard, script);
        drain(&mut monitoring).await;

        assert_eq!(clipboard.snapshot().data, b"ok");
    }
}
