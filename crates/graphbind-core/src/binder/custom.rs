use crate::context::{DecodeContext, EncodeContext};
use crate::errors::Result;
use crate::token::{TokenReader, TokenWriter};
use crate::value::Value;

/// Hand-written read strategy that replaces the generated one for a type
pub trait CustomReader: Send + Sync {
    /// Entered on the first token of the value; must leave the cursor after it
    fn read(&self, ctx: &mut DecodeContext<'_>, reader: &mut dyn TokenReader) -> Result<Value>;
}

/// Hand-written write strategy that replaces the generated one for a type
pub trait CustomWriter: Send + Sync {
    fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()>;
}
