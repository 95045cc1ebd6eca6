#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use docmap::{
    CodecRegistry, Collection, FieldMapCodec, InMemoryGateway, Object, Record, RecordSchema,
    Session, SessionConfig, Value,
};

pub fn call_log_states() -> Object {
    Object::new("CallLogStates")
        .with("clean", false)
        .with("status", 0)
        .with("has_marked_transcript", false)
}

pub fn comment(text: &str, time: i64) -> Object {
    Object::new("Comment").with("text", text).with("time", time)
}

pub fn transcript_line(text: &str) -> Object {
    Object::new("TranscriptLine")
        .with("text", text)
        .with("sentiment", 0.0)
        .with("tags", Value::Sequence(vec![]))
}

pub fn cdr_schema() -> RecordSchema {
    RecordSchema::new("Cdr", "cdrs", "session_id")
        .field("session_id", Value::Null)
        .field("online", false)
        .field("duration", 0)
        .field("states", call_log_states())
        .field("comment", comment("", 0))
        .field("tags", Value::Sequence(vec![]))
        .field("meta", Value::Map(BTreeMap::new()))
        .field("transcript", Value::Sequence(vec![]))
}

pub fn codecs() -> CodecRegistry {
    CodecRegistry::new()
        .with(FieldMapCodec::new(call_log_states()))
        .with(FieldMapCodec::new(comment("", 0)))
        .with(FieldMapCodec::new(transcript_line("")))
}

pub struct Fixture {
    pub gateway: Arc<InMemoryGateway>,
    pub session: Session,
    pub cdrs: Collection,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let gateway = Arc::new(InMemoryGateway::new());
        let session = Session::with_config(gateway.clone(), config).with_codecs(codecs());
        let cdrs = session.collection(cdr_schema()).unwrap();
        Self {
            gateway,
            session,
            cdrs,
        }
    }

    /// A committed record with the call log cleared, so tests only see their own calls.
    pub fn stored_cdr(&self, session_id: &str) -> Record {
        let mut cdr = self.cdrs.create();
        cdr.set("session_id", session_id).unwrap();
        cdr.commit().unwrap();
        self.gateway.clear_calls();
        cdr
    }
}
