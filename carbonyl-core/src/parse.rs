//! Folds a token stream into objects and arrays.

use log::trace;

use crate::error::Error;
use crate::storage::MapFactory;
use crate::token::Token;
use crate::tokenizer::Tokenizer;
use crate::value::{Object, Value};

/// Recursive-descent consumer of a [`Tokenizer`].
///
/// Nested objects are allocated through the same factory as the outer one.
pub struct Parser<'f> {
    factory: &'f dyn MapFactory,
    max_depth: Option<usize>,
    depth: usize,
}

impl<'f> Parser<'f> {
    pub fn new(factory: &'f dyn MapFactory) -> Self {
        Parser {
            factory,
            max_depth: None,
            depth: 0,
        }
    }

    /// Bounds nesting of objects and arrays. `None` means unbounded.
    pub fn with_max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Parses one object literal into a freshly allocated object.
    pub fn parse_object(&mut self, tokens: &mut dyn Tokenizer) -> Result<Object, Error> {
        let mut object = Object::with_factory(self.factory, None);
        self.populate_object(tokens, &mut object)?;
        Ok(object)
    }

    /// Consumes an object literal, inserting its members into `object`.
    ///
    /// A key that already exists in `object` is a syntax error, including keys
    /// placed there before this call.
    pub fn populate_object(
        &mut self,
        tokens: &mut dyn Tokenizer,
        object: &mut Object,
    ) -> Result<(), Error> {
        if tokens.next_token()? != Token::LeftBrace {
            return Err(tokens.syntax_error("A JSON object text must begin with '{'"));
        }

        let mut first = true;
        loop {
            let key = match tokens.next_token()? {
                Token::End => {
                    return Err(tokens.syntax_error("A JSON object text must end with '}'"));
                }
                Token::RightBrace => return Ok(()),
                Token::LeftBrace | Token::LeftBracket if first => {
                    return Err(tokens.syntax_error(
                        "A JSON object can not directly nest another JSON object or JSON array",
                    ));
                }
                _ => {
                    tokens.back()?;
                    self.next_key(tokens)?
                }
            };
            first = false;

            if tokens.next_token()? != Token::Colon {
                return Err(tokens.syntax_error("Expected a ':' after a key"));
            }

            if object.contains_key(&key) {
                return Err(tokens.syntax_error(&format!("Duplicate key \"{key}\"")));
            }
            let value = self.next_value(tokens)?;
            trace!("parsed member {key:?}");
            object.put(key, value)?;

            match tokens.next_token()? {
                Token::Comma | Token::Semicolon => {
                    if tokens.next_token()? == Token::RightBrace {
                        return Ok(());
                    }
                    tokens.back()?;
                }
                Token::RightBrace => return Ok(()),
                _ => return Err(tokens.syntax_error("Expected a ',' or '}'")),
            }
        }
    }

    /// Parses one array literal.
    pub fn parse_array(&mut self, tokens: &mut dyn Tokenizer) -> Result<Vec<Value>, Error> {
        if tokens.next_token()? != Token::LeftBracket {
            return Err(tokens.syntax_error("A JSON array text must begin with '['"));
        }

        let mut items = Vec::new();
        if tokens.next_token()? == Token::RightBracket {
            return Ok(items);
        }
        tokens.back()?;

        loop {
            items.push(self.next_value(tokens)?);
            match tokens.next_token()? {
                Token::Comma => {
                    if tokens.next_token()? == Token::RightBracket {
                        return Ok(items);
                    }
                    tokens.back()?;
                }
                Token::RightBracket => return Ok(items),
                Token::End => {
                    return Err(tokens.syntax_error("A JSON array text must end with ']'"));
                }
                _ => return Err(tokens.syntax_error("Expected a ',' or ']'")),
            }
        }
    }

    /// Reads one value: a scalar, or a nested object or array.
    pub fn next_value(&mut self, tokens: &mut dyn Tokenizer) -> Result<Value, Error> {
        match tokens.next_token()? {
            Token::Scalar(value) => Ok(value),
            Token::LeftBrace => {
                tokens.back()?;
                self.nested(|parser| parser.parse_object(tokens).map(Value::Object))
            }
            Token::LeftBracket => {
                tokens.back()?;
                self.nested(|parser| parser.parse_array(tokens).map(Value::Array))
            }
            Token::End => Err(tokens.syntax_error("Unexpected end of input")),
            other => Err(tokens.syntax_error(&format!(
                "Expected a value but found {}",
                other.describe()
            ))),
        }
    }

    fn next_key(&mut self, tokens: &mut dyn Tokenizer) -> Result<String, Error> {
        let value = self.next_value(tokens)?;
        value
            .key_text()
            .ok_or_else(|| tokens.syntax_error("A JSON object key must be a scalar"))
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if let Some(limit) = self.max_depth {
            if self.depth >= limit {
                return Err(Error::DepthExceeded { limit });
            }
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }
}

/// Parses a complete JSON document: one value followed by end of input.
pub fn parse_document(tokens: &mut dyn Tokenizer, factory: &dyn MapFactory) -> Result<Value, Error> {
    let value = Parser::new(factory).next_value(tokens)?;
    match tokens.next_token()? {
        Token::End => Ok(value),
        _ => Err(tokens.syntax_error("Unexpected content after the document")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HashMapFactory, IndexMapFactory};
    use crate::tokenizer::TextTokenizer;

    fn parse(text: &str) -> Result<Object, Error> {
        Parser::new(&HashMapFactory).parse_object(&mut TextTokenizer::new(text))
    }

    fn message(err: Error) -> String {
        match err {
            Error::Syntax { message, .. } => message,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn parses_flat_object() {
        let object = parse(r#"{"a": 1, "b": "two", "c": null, "d": false}"#).unwrap();
        assert_eq!(object.len(), 4);
        assert_eq!(object.get("a"), Some(&Value::Int(1)));
        assert_eq!(object.get("b"), Some(&Value::String("two".into())));
        assert_eq!(object.get("c"), Some(&Value::Null));
        assert_eq!(object.get("d"), Some(&Value::Bool(false)));
    }

    #[test]
    fn parses_nested_structures() {
        let object = parse(r#"{"outer": {"inner": [1, {"deep": true}]}}"#).unwrap();
        let outer = object.get("outer").and_then(Value::as_object).unwrap();
        let inner = outer.get("inner").and_then(Value::as_array).unwrap();
        assert_eq!(inner[0], Value::Int(1));
        assert_eq!(
            inner[1].as_object().and_then(|o| o.get("deep")),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn empty_object() {
        assert!(parse("{}").unwrap().is_empty());
        assert!(parse("  {  }  ").unwrap().is_empty());
    }

    #[test]
    fn duplicate_key_rejected() {
        let err = parse(r#"{"a":1,"a":2}"#).unwrap_err();
        assert_eq!(message(err), "Duplicate key \"a\"");
    }

    #[test]
    fn trailing_comma_tolerated() {
        let object = parse(r#"{"a":1,}"#).unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn semicolon_separates_pairs() {
        let object = parse(r#"{"a":1; "b":2}"#).unwrap();
        assert_eq!(object.len(), 2);
    }

    #[test]
    fn unterminated_object() {
        assert_eq!(message(parse("{").unwrap_err()), "A JSON object text must end with '}'");
        assert!(matches!(parse(r#"{"a":1"#), Err(Error::Syntax { .. })));
        assert!(matches!(parse(r#"{"a":"#), Err(Error::Syntax { .. })));
    }

    #[test]
    fn must_begin_with_brace() {
        assert_eq!(
            message(parse("[1]").unwrap_err()),
            "A JSON object text must begin with '{'"
        );
    }

    #[test]
    fn unkeyed_nested_structure_rejected() {
        assert!(message(parse("{{}}").unwrap_err()).contains("can not directly nest"));
        assert!(message(parse("{[1]}").unwrap_err()).contains("can not directly nest"));
        assert!(message(parse(r#"{"a":1, {"b":2}:3}"#).unwrap_err()).contains("must be a scalar"));
    }

    #[test]
    fn missing_colon_and_separator() {
        assert_eq!(message(parse(r#"{"a" 1}"#).unwrap_err()), "Expected a ':' after a key");
        assert_eq!(message(parse(r#"{"a":1 "b":2}"#).unwrap_err()), "Expected a ',' or '}'");
    }

    #[test]
    fn scalar_keys_become_text() {
        let object = parse(r#"{1: "one", true: "yes"}"#).unwrap();
        assert_eq!(object.get("1"), Some(&Value::String("one".into())));
        assert_eq!(object.get("true"), Some(&Value::String("yes".into())));
    }

    #[test]
    fn float_keys_keep_their_fraction() {
        let object = parse(r#"{1.0: "x", 2.5: "y"}"#).unwrap();
        assert_eq!(object.get("1.0"), Some(&Value::String("x".into())));
        assert_eq!(object.get("2.5"), Some(&Value::String("y".into())));
        assert!(!object.contains_key("1"));
    }

    #[test]
    fn populate_rejects_keys_already_present() {
        let mut object = Object::new();
        object.put("a", 0).unwrap();
        let mut tokens = TextTokenizer::new(r#"{"a": 1}"#);
        let err = Parser::new(&HashMapFactory)
            .populate_object(&mut tokens, &mut object)
            .unwrap_err();
        assert!(message(err).starts_with("Duplicate key"));
    }

    #[test]
    fn syntax_error_carries_position() {
        match parse("{\n\"a\" 1}").unwrap_err() {
            Error::Syntax { position, .. } => assert_eq!(position.line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn arrays() {
        let mut parser = Parser::new(&HashMapFactory);
        let items = parser
            .parse_array(&mut TextTokenizer::new("[1, [2], {}, ]"))
            .unwrap();
        assert_eq!(items.len(), 3);
        assert!(parser.parse_array(&mut TextTokenizer::new("[1,,2]")).is_err());
        assert!(parser.parse_array(&mut TextTokenizer::new("[1")).is_err());
        assert!(parser.parse_array(&mut TextTokenizer::new("[]")).unwrap().is_empty());
    }

    #[test]
    fn depth_limit() {
        let text = r#"{"a": {"b": {"c": 1}}}"#;
        let mut tokens = TextTokenizer::new(text);
        let err = Parser::new(&HashMapFactory)
            .with_max_depth(Some(1))
            .parse_object(&mut tokens)
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 1 }));

        let mut tokens = TextTokenizer::new(text);
        assert!(Parser::new(&HashMapFactory)
            .with_max_depth(Some(2))
            .parse_object(&mut tokens)
            .is_ok());
    }

    #[test]
    fn nested_objects_use_parser_factory() {
        let mut tokens = TextTokenizer::new(r#"{"n": {"z": 1, "a": 2, "m": 3}}"#);
        let object = Parser::new(&IndexMapFactory).parse_object(&mut tokens).unwrap();
        let nested = object.get("n").and_then(Value::as_object).unwrap();
        assert_eq!(nested.keys().collect::<Vec<_>>(), ["z", "a", "m"]);
    }

    #[test]
    fn documents() {
        let value = parse_document(&mut TextTokenizer::new(" [true] "), &HashMapFactory).unwrap();
        assert_eq!(value, Value::Array(vec![Value::Bool(true)]));
        assert!(parse_document(&mut TextTokenizer::new("1 2"), &HashMapFactory).is_err());
    }
}
