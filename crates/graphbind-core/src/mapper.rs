use crate::binder::{BinderId, ReadBinder, WriteBinder};
use crate::config::MapperConfig;
use crate::context::{DecodeContext, EncodeContext};
use crate::errors::{BindError, Result};
use crate::factory::{ReadFactory, WriteFactory};
use crate::introspect::Introspector;
use crate::problems::ProblemHandler;
use crate::provider::BinderProvider;
use crate::token::{json_to_tokens, JsonWriter, TokenReader, TokenWriter};
use crate::types::TypeDescriptor;
use crate::value::{Document, Value};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Binder counts and call statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapperStats {
    pub read_binders: usize,
    pub write_binders: usize,
}

/// Outcome of a read call that also reports lenient creator calls
#[derive(Debug)]
pub struct ReadOutcome {
    pub document: Document,
    /// Creator arguments filled with type defaults
    pub defaulted_arguments: usize,
}

/// Entry point: owns the configuration, the introspector and both binder caches.
///
/// A mapper is meant to be built once and shared; binders are compiled on
/// first use of a type and reused for every later call, from any thread.
pub struct Mapper {
    config: Arc<MapperConfig>,
    introspector: Arc<dyn Introspector>,
    problem_handlers: Vec<Arc<dyn ProblemHandler>>,
    injectables: FxHashMap<String, Value>,
    readers: BinderProvider<ReadFactory>,
    writers: BinderProvider<WriteFactory>,
}

impl Mapper {
    /// Create a mapper with the default configuration
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self::with_config(MapperConfig::default(), introspector)
    }

    pub fn with_config(config: MapperConfig, introspector: Arc<dyn Introspector>) -> Self {
        Self::with_dependencies(config, introspector, Vec::new())
    }

    /// Create a mapper with explicit problem handlers (for testing)
    pub fn with_dependencies(
        config: MapperConfig,
        introspector: Arc<dyn Introspector>,
        problem_handlers: Vec<Arc<dyn ProblemHandler>>,
    ) -> Self {
        Mapper {
            config: Arc::new(config),
            readers: BinderProvider::new(ReadFactory::new(introspector.clone())),
            writers: BinderProvider::new(WriteFactory::new(introspector.clone())),
            introspector,
            problem_handlers,
            injectables: FxHashMap::default(),
        }
    }

    /// Register a value for properties and creator arguments with this injection id
    pub fn with_injectable(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.injectables.insert(id.into(), value.into());
        self
    }

    pub fn with_problem_handler(mut self, handler: Arc<dyn ProblemHandler>) -> Self {
        self.problem_handlers.push(handler);
        self
    }

    pub fn config(&self) -> &Arc<MapperConfig> {
        &self.config
    }

    pub fn introspector(&self) -> &dyn Introspector {
        self.introspector.as_ref()
    }

    pub fn problem_handlers(&self) -> &[Arc<dyn ProblemHandler>] {
        &self.problem_handlers
    }

    pub fn injectable(&self, id: &str) -> Option<&Value> {
        self.injectables.get(id)
    }

    pub fn read_provider(&self) -> &BinderProvider<ReadFactory> {
        &self.readers
    }

    pub fn write_provider(&self) -> &BinderProvider<WriteFactory> {
        &self.writers
    }

    /// Compiled read binder for a type
    pub fn reader_binder(&self, ty: &TypeDescriptor) -> Result<Arc<ReadBinder>> {
        self.readers.binder(ty)
    }

    /// Compiled write binder for a type
    pub fn writer_binder(&self, ty: &TypeDescriptor) -> Result<Arc<WriteBinder>> {
        self.writers.binder(ty)
    }

    pub fn read_binder_id(&self, ty: &TypeDescriptor) -> Result<BinderId> {
        self.readers.resolve(ty)
    }

    pub fn stats(&self) -> MapperStats {
        MapperStats {
            read_binders: self.readers.len(),
            write_binders: self.writers.len(),
        }
    }

    /// Read one value of type `ty` from the stream
    pub fn read_value(&self, ty: &TypeDescriptor, reader: &mut dyn TokenReader) -> Result<Document> {
        self.read_with_outcome(ty, reader).map(|outcome| outcome.document)
    }

    pub fn read_with_outcome(
        &self,
        ty: &TypeDescriptor,
        reader: &mut dyn TokenReader,
    ) -> Result<ReadOutcome> {
        let binding = self.readers.binding(ty)?;
        let mut ctx = DecodeContext::new(self);
        let root = binding.read(&mut ctx, reader)?;

        if self.config.read_options.fail_on_trailing_tokens {
            if let Some(kind) = reader.current_kind() {
                return Err(BindError::Stream(format!(
                    "trailing {} token after root value",
                    kind
                )));
            }
        }
        let defaulted_arguments = ctx.defaulted_arguments();
        debug!(ty = %ty, objects = ctx.graph().len(), "read document");
        Ok(ReadOutcome {
            document: Document::new(ctx.into_graph(), root),
            defaulted_arguments,
        })
    }

    pub fn read_json(&self, ty: &TypeDescriptor, json: &serde_json::Value) -> Result<Document> {
        self.read_value(ty, &mut json_to_tokens(json).into_reader())
    }

    pub fn read_str(&self, ty: &TypeDescriptor, text: &str) -> Result<Document> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        self.read_json(ty, &json)
    }

    /// Write the document's root as type `ty`
    pub fn write_value(
        &self,
        ty: &TypeDescriptor,
        document: &Document,
        writer: &mut dyn TokenWriter,
    ) -> Result<()> {
        let binding = self.writers.binding(ty)?;
        let mut ctx = EncodeContext::new(self, document.graph());
        binding.write(&mut ctx, writer, document.root())
    }

    pub fn to_json_value(&self, ty: &TypeDescriptor, document: &Document) -> Result<serde_json::Value> {
        let mut writer = JsonWriter::new();
        self.write_value(ty, document, &mut writer)?;
        writer.finish()
    }

    pub fn to_json_string(&self, ty: &TypeDescriptor, document: &Document, pretty: bool) -> Result<String> {
        let json = self.to_json_value(ty, document)?;
        let text = if pretty {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        };
        Ok(text)
    }
}
