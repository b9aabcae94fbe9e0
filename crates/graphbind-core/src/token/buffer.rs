use super::{copy_value, Token, TokenReader, TokenWriter};
use crate::errors::{BindError, Result};
use crate::value::Value;

/// In-memory capture of a token sequence that can be replayed later
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the value under the reader's cursor, advancing past it
    pub fn capture(reader: &mut dyn TokenReader) -> Result<Self> {
        let mut buffer = TokenBuffer::new();
        copy_value(reader, &mut buffer)?;
        Ok(buffer)
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Append every token of `other`
    pub fn append(&mut self, other: &TokenBuffer) {
        self.tokens.extend(other.tokens.iter().cloned());
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Replay a copy of the captured tokens
    pub fn reader(&self) -> BufferReader {
        BufferReader::new(self.tokens.clone())
    }

    pub fn into_reader(self) -> BufferReader {
        BufferReader::new(self.tokens)
    }

    /// The captured value as a single string, if it is one
    pub fn as_scalar_text(&self) -> Option<String> {
        match self.tokens.as_slice() {
            [Token::String(s)] => Some(s.clone()),
            [Token::Int(v)] => Some(v.to_string()),
            [Token::Long(v)] => Some(v.to_string()),
            [Token::Bool(v)] => Some(v.to_string()),
            _ => None,
        }
    }
}

impl TokenWriter for TokenBuffer {
    fn write_start_object(&mut self) -> Result<()> {
        self.push(Token::StartObject);
        Ok(())
    }

    fn write_end_object(&mut self) -> Result<()> {
        self.push(Token::EndObject);
        Ok(())
    }

    fn write_start_array(&mut self) -> Result<()> {
        self.push(Token::StartArray);
        Ok(())
    }

    fn write_end_array(&mut self) -> Result<()> {
        self.push(Token::EndArray);
        Ok(())
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        self.push(Token::FieldName(name.to_string()));
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.push(Token::String(value.to_string()));
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        self.push(Token::Int(value));
        Ok(())
    }

    fn write_long(&mut self, value: i64) -> Result<()> {
        self.push(Token::Long(value));
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.push(Token::Double(value));
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.push(Token::Bool(value));
        Ok(())
    }

    fn write_null(&mut self) -> Result<()> {
        self.push(Token::Null);
        Ok(())
    }

    fn write_embedded(&mut self, value: &Value) -> Result<()> {
        self.push(Token::Embedded(value.clone()));
        Ok(())
    }
}

/// Reader replaying an owned token sequence
#[derive(Debug, Clone)]
pub struct BufferReader {
    tokens: Vec<Token>,
    position: usize,
}

impl BufferReader {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.tokens.len()
    }
}

impl TokenReader for BufferReader {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Result<()> {
        if self.position >= self.tokens.len() {
            return Err(BindError::Stream("advance past end of buffered tokens".into()));
        }
        self.position += 1;
        Ok(())
    }
}

/// Replays a buffered prefix, then continues with the live stream
pub struct ChainedReader<'a> {
    head: BufferReader,
    tail: &'a mut dyn TokenReader,
}

impl<'a> ChainedReader<'a> {
    pub fn new(head: TokenBuffer, tail: &'a mut dyn TokenReader) -> Self {
        Self {
            head: head.into_reader(),
            tail,
        }
    }
}

impl TokenReader for ChainedReader<'_> {
    fn current(&self) -> Option<&Token> {
        if self.head.is_exhausted() {
            self.tail.current()
        } else {
            self.head.current()
        }
    }

    fn advance(&mut self) -> Result<()> {
        if self.head.is_exhausted() {
            self.tail.advance()
        } else {
            self.head.advance()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chained_reader_switches_to_tail() {
        let mut head = TokenBuffer::new();
        head.push(Token::StartObject);
        head.push(Token::FieldName("a".into()));
        head.push(Token::Int(1));

        let mut tail = BufferReader::new(vec![
            Token::FieldName("b".into()),
            Token::Int(2),
            Token::EndObject,
            Token::Null,
        ]);

        let mut chained = ChainedReader::new(head, &mut tail);
        let mut replayed = TokenBuffer::new();
        copy_value(&mut chained, &mut replayed).unwrap();

        assert_eq!(replayed.len(), 6);
        assert_eq!(tail.current(), Some(&Token::Null));
    }

    #[test]
    fn test_scalar_text() {
        let mut buffer = TokenBuffer::new();
        buffer.push(Token::String("dog".into()));
        assert_eq!(buffer.as_scalar_text(), Some("dog".to_string()));

        buffer.push(Token::Null);
        assert_eq!(buffer.as_scalar_text(), None);
    }

    #[test]
    fn test_buffer_reader_rejects_advance_past_end() {
        let mut reader = BufferReader::new(vec![Token::Null]);
        reader.advance().unwrap();
        assert!(reader.current().is_none());
        assert!(matches!(reader.advance(), Err(BindError::Stream(_))));
    }
}
