use crate::errors::Result;
use crate::token::{copy_value, JsonWriter, TokenBuffer};
use crate::types::TypeDescriptor;
use crate::value::Value;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Outcome of consulting a [`ProblemHandler`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemResolution {
    /// Pass the problem on to the next handler
    Unhandled,
    /// The field was dealt with and its value is dropped
    Handled,
    /// Store this value in the instance's extras under the field name
    Value(Value),
}

/// Hook consulted, in registration order, for fields no property claims.
///
/// Handlers run after the ignorable set, the catch-all and the ignore-unknown
/// options have all declined the field. The field's value has already been
/// captured, so a handler never touches the live stream.
pub trait ProblemHandler: Send + Sync {
    fn unknown_property(
        &self,
        ty: &TypeDescriptor,
        name: &str,
        value: &TokenBuffer,
    ) -> Result<ProblemResolution>;
}

/// One unknown field seen by a [`CollectingProblemHandler`]
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub ty: String,
    pub name: String,
    pub value: TokenBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectMode {
    Skip,
    Observe,
    KeepAsTree,
}

/// Records every unknown field; mostly useful in tests
pub struct CollectingProblemHandler {
    problems: Mutex<Vec<Problem>>,
    mode: CollectMode,
}

impl CollectingProblemHandler {
    /// Record and drop unknown fields
    pub fn new() -> Self {
        Self::with_mode(CollectMode::Skip)
    }

    /// Record, then let the next handler or the default policy decide
    pub fn observing() -> Self {
        Self::with_mode(CollectMode::Observe)
    }

    /// Record and keep each unknown field as a JSON tree in the instance extras
    pub fn keeping() -> Self {
        Self::with_mode(CollectMode::KeepAsTree)
    }

    fn with_mode(mode: CollectMode) -> Self {
        Self {
            problems: Mutex::new(Vec::new()),
            mode,
        }
    }

    pub fn problems(&self) -> Vec<Problem> {
        self.problems
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.problems
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for CollectingProblemHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProblemHandler for CollectingProblemHandler {
    fn unknown_property(
        &self,
        ty: &TypeDescriptor,
        name: &str,
        value: &TokenBuffer,
    ) -> Result<ProblemResolution> {
        self.problems
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Problem {
                ty: ty.to_string(),
                name: name.to_string(),
                value: value.clone(),
            });

        match self.mode {
            CollectMode::Skip => Ok(ProblemResolution::Handled),
            CollectMode::Observe => Ok(ProblemResolution::Unhandled),
            CollectMode::KeepAsTree => {
                let mut writer = JsonWriter::new();
                copy_value(&mut value.reader(), &mut writer)?;
                Ok(ProblemResolution::Value(Value::Tree(writer.finish()?)))
            }
        }
    }
}

/// Logs unknown fields at warn level and drops them
#[derive(Debug, Default)]
pub struct LoggingProblemHandler;

impl LoggingProblemHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ProblemHandler for LoggingProblemHandler {
    fn unknown_property(
        &self,
        ty: &TypeDescriptor,
        name: &str,
        _value: &TokenBuffer,
    ) -> Result<ProblemResolution> {
        warn!(ty = %ty, field = name, "skipping unknown property");
        Ok(ProblemResolution::Handled)
    }
}
