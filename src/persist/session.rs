use std::fmt;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::core::{CodecRegistry, Result};
use crate::gateway::DocumentGateway;

use super::{Collection, Record, RecordSchema};

/// Everything a record needs to reach its store: the gateway, the session
/// configuration and the object codecs. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    gateway: Arc<dyn DocumentGateway>,
    config: Arc<SessionConfig>,
    codecs: Arc<CodecRegistry>,
}

impl Session {
    pub fn new(gateway: Arc<dyn DocumentGateway>) -> Self {
        Self::with_config(gateway, SessionConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn DocumentGateway>, config: SessionConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
            codecs: Arc::new(CodecRegistry::new()),
        }
    }

    /// Replaces the codec registry used for typed objects.
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = Arc::new(codecs);
        self
    }

    pub fn gateway(&self) -> &dyn DocumentGateway {
        self.gateway.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// New unattached record with the schema's declared defaults.
    pub fn create(&self, schema: &Arc<RecordSchema>) -> Record {
        Record::new(self.clone(), Arc::clone(schema))
    }

    pub fn collection(&self, schema: RecordSchema) -> Result<Collection> {
        Collection::new(self.clone(), schema)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("codecs", &self.codecs)
            .finish_non_exhaustive()
    }
}
