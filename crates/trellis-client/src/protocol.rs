//! Wire envelopes for the Trellis backend protocol.
//!
//! Every request is a JSON object tagged by `command`; every reply is a flat
//! envelope whose `status` field doubles as control flow. The dual-purpose
//! status/message pair used by chunk replies is decoded exactly once here,
//! into [`ChunkResult`], so nothing downstream ever string-matches on "EOF".

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrellisError};
use crate::params::ProcessingParams;

/// Request size for each chunk fetch. A tuning constant, not a protocol
/// limit; the server may return fewer bytes than requested.
pub const CHUNK_SIZE: u32 = 50_000;

/// The two artifact kinds a finished job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Model,
    Video,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Model => "glb",
            ArtifactKind::Video => "mp4",
        }
    }

    /// File name an artifact of this kind is stored under.
    pub fn file_name(self, session_id: &str) -> String {
        format!("{}_output.{}", session_id.trim(), self.extension())
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Video => write!(f, "video"),
        }
    }
}

/// Commands sent to the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    ProcessSingle {
        image: String,
        params: ProcessingParams,
    },
    ProcessMulti {
        images: Vec<String>,
        params: ProcessingParams,
    },
    GetGlbChunk {
        session_id: String,
        task_id: String,
        offset: u64,
        size: u32,
    },
    GetVideoChunk {
        session_id: String,
        task_id: String,
        offset: u64,
        size: u32,
    },
    CheckStatus {
        session_id: String,
        task_id: String,
    },
}

impl Command {
    pub fn chunk(kind: ArtifactKind, session_id: &str, task_id: &str, offset: u64) -> Self {
        let (session_id, task_id) = (session_id.to_string(), task_id.to_string());
        match kind {
            ArtifactKind::Model => Command::GetGlbChunk {
                session_id,
                task_id,
                offset,
                size: CHUNK_SIZE,
            },
            ArtifactKind::Video => Command::GetVideoChunk {
                session_id,
                task_id,
                offset,
                size: CHUNK_SIZE,
            },
        }
    }
}

/// Flat reply envelope. Which optional fields are present depends on the
/// command the reply answers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reply {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
}

impl Reply {
    pub fn is_status(&self, status: &str) -> bool {
        self.status == status
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_string())
    }
}

/// Outcome of a single chunk fetch, decoded at the protocol boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    Data(Vec<u8>),
    EndOfStream,
    Failure(String),
}

impl ChunkResult {
    /// Interpret a chunk reply. End-of-stream is signalled either by an
    /// explicit EOF message or by a success reply carrying an empty chunk;
    /// the latter guards against servers that never send the explicit EOF.
    pub fn from_reply(reply: &Reply) -> Result<ChunkResult> {
        if !reply.is_status("success") {
            if reply.message.as_deref() == Some("EOF") {
                return Ok(ChunkResult::EndOfStream);
            }
            return Ok(ChunkResult::Failure(reply.message_or("unexpected status")));
        }
        let Some(encoded) = reply.data.as_deref() else {
            return Err(TrellisError::Server(
                "success reply without data field".to_string(),
            ));
        };
        let bytes = BASE64.decode(encoded)?;
        if bytes.is_empty() {
            return Ok(ChunkResult::EndOfStream);
        }
        Ok(ChunkResult::Data(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> Reply {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn command_tags_match_the_wire_format() {
        let cmd = Command::chunk(ArtifactKind::Model, "s1", "t1", 50_000);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "get_glb_chunk");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["task_id"], "t1");
        assert_eq!(json["offset"], 50_000);
        assert_eq!(json["size"], 50_000);

        let cmd = Command::chunk(ArtifactKind::Video, "s1", "t1", 0);
        assert_eq!(serde_json::to_value(&cmd).unwrap()["command"], "get_video_chunk");

        let cmd = Command::ProcessSingle {
            image: "aGk=".into(),
            params: ProcessingParams::default(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "process_single");
        assert_eq!(json["params"]["texture_size"], 1024);
    }

    #[test]
    fn chunk_reply_with_data_decodes() {
        let r = reply(r#"{"status":"success","data":"aGVsbG8="}"#);
        assert_eq!(
            ChunkResult::from_reply(&r).unwrap(),
            ChunkResult::Data(b"hello".to_vec())
        );
    }

    #[test]
    fn eof_message_ends_the_stream_regardless_of_status() {
        let r = reply(r#"{"status":"done","message":"EOF"}"#);
        assert_eq!(ChunkResult::from_reply(&r).unwrap(), ChunkResult::EndOfStream);
    }

    #[test]
    fn empty_chunk_is_treated_as_eof() {
        let r = reply(r#"{"status":"success","data":""}"#);
        assert_eq!(ChunkResult::from_reply(&r).unwrap(), ChunkResult::EndOfStream);
    }

    #[test]
    fn error_status_becomes_failure() {
        let r = reply(r#"{"status":"error","message":"no such task"}"#);
        assert_eq!(
            ChunkResult::from_reply(&r).unwrap(),
            ChunkResult::Failure("no such task".to_string())
        );
    }

    #[test]
    fn undecodable_data_is_an_encoding_error() {
        let r = reply(r#"{"status":"success","data":"%%%"}"#);
        assert!(ChunkResult::from_reply(&r).is_err());
    }

    #[test]
    fn artifact_file_names_are_deterministic() {
        assert_eq!(ArtifactKind::Model.file_name("abc"), "abc_output.glb");
        assert_eq!(ArtifactKind::Video.file_name(" abc "), "abc_output.mp4");
    }
}
