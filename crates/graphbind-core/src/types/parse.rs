use super::{TypeDescriptor, TypeKind};
use crate::errors::{BindError, Result};
use std::iter::Peekable;
use std::str::CharIndices;

impl TypeDescriptor {
    /// Parse a type expression.
    ///
    /// Grammar: `type := ident ('<' type (',' type)* '>')? ('[' ']')*`.
    /// `list`, `set` and `map` build containers, well-known names map to
    /// scalars, anything else is a nominal type.
    pub fn parse(expr: &str) -> Result<TypeDescriptor> {
        let mut parser = TypeParser {
            source: expr,
            chars: expr.char_indices().peekable(),
        };
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if let Some((pos, c)) = parser.chars.next() {
            return Err(parser.error(format!("unexpected `{}` at offset {}", c, pos)));
        }
        Ok(ty)
    }
}

struct TypeParser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> TypeParser<'a> {
    fn parse_type(&mut self) -> Result<TypeDescriptor> {
        self.skip_whitespace();
        let name = self.parse_ident()?;
        self.skip_whitespace();

        let mut params = Vec::new();
        if self.eat('<') {
            loop {
                params.push(self.parse_type()?);
                self.skip_whitespace();
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(self.error("expected `,` or `>` in type arguments"));
            }
        }

        let mut ty = self.build(name, params)?;

        loop {
            self.skip_whitespace();
            if !self.eat('[') {
                break;
            }
            self.skip_whitespace();
            if !self.eat(']') {
                return Err(self.error("expected `]` after `[`"));
            }
            ty = TypeDescriptor::array(ty);
        }
        Ok(ty)
    }

    fn build(&self, name: &'a str, mut params: Vec<TypeDescriptor>) -> Result<TypeDescriptor> {
        let arity = |expected: usize| -> Result<()> {
            if params.len() == expected {
                Ok(())
            } else {
                Err(self.error(format!(
                    "`{}` takes {} type argument(s), found {}",
                    name,
                    expected,
                    params.len()
                )))
            }
        };

        match name {
            "list" | "List" | "vec" | "Vec" => {
                arity(1)?;
                Ok(TypeDescriptor::list(params.remove(0)))
            }
            "set" | "Set" => {
                arity(1)?;
                Ok(TypeDescriptor::set(params.remove(0)))
            }
            "map" | "Map" => {
                arity(2)?;
                let value = params.remove(1);
                let key = params.remove(0);
                Ok(TypeDescriptor::map(key, value))
            }
            _ => match TypeDescriptor::well_known(name) {
                Some(kind) => {
                    arity(0)?;
                    Ok(TypeDescriptor::new(kind))
                }
                None => Ok(TypeDescriptor::new(TypeKind::Named {
                    name: name.into(),
                    params,
                })),
            },
        }
    }

    fn parse_ident(&mut self) -> Result<&'a str> {
        let start = match self.chars.peek() {
            Some(&(pos, c)) if c.is_alphabetic() || c == '_' => pos,
            Some(&(_, c)) => return Err(self.error(format!("expected type name, found `{}`", c))),
            None => return Err(self.error("expected type name, found end of input")),
        };
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '$') {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Ok(&self.source[start..end])
    }

    fn eat(&mut self, expected: char) -> bool {
        match self.chars.peek() {
            Some(&(_, c)) if c == expected => {
                self.chars.next();
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn error(&self, message: impl Into<String>) -> BindError {
        BindError::definition(self.source, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    #[test]
    fn test_parse_nested_containers() {
        let ty = TypeDescriptor::parse("map<string, list<Child>>").unwrap();
        assert_eq!(
            ty,
            TypeDescriptor::map(
                TypeDescriptor::string(),
                TypeDescriptor::list(TypeDescriptor::named("Child"))
            )
        );
    }

    #[test]
    fn test_parse_arrays_and_generics() {
        let ty = TypeDescriptor::parse("Box<int>[][]").unwrap();
        assert_eq!(ty.to_string(), "Box<int>[][]");

        let inner = ty.content_type().and_then(|t| t.content_type()).unwrap();
        assert_eq!(inner.raw_name(), Some("Box"));
        assert_eq!(inner.params()[0].scalar_kind(), Some(ScalarKind::Int));
    }

    #[test]
    fn test_parse_qualified_names() {
        let ty = TypeDescriptor::parse("  zoo.animals::Dog ").unwrap();
        assert_eq!(ty.raw_name(), Some("zoo.animals::Dog"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypeDescriptor::parse("list<string, int>").is_err());
        assert!(TypeDescriptor::parse("map<string>").is_err());
        assert!(TypeDescriptor::parse("string<int>").is_err());
        assert!(TypeDescriptor::parse("list<").is_err());
        assert!(TypeDescriptor::parse("Node[").is_err());
        assert!(TypeDescriptor::parse("Node Extra").is_err());
        assert!(TypeDescriptor::parse("").is_err());
    }
}
