/// Native evaluation of the `INPUTS` binding
///
/// Only the top-level assignment to `INPUTS` is evaluated, together with the
/// top-level names it refers to. The rest of the module is never looked at, so
/// evaluating it has no side effects.
use std::collections::HashSet;
use std::path::PathBuf;

use super::LineState;

pub const INPUTS_NAME: &str = "INPUTS";

/// Evaluation failure, reported against the line of the binding being evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub line: usize,
    pub message: String,
}

impl LiteralError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A top-level `NAME = expression` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub expr: String,
    /// 1-based line of the assignment
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    List(Vec<Value>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

/// Evaluate the last top-level `INPUTS` binding of `source`.
///
/// Returns `Ok(None)` when the module has no such binding.
pub fn evaluate_inputs(source: &str) -> Result<Option<Vec<String>>, LiteralError> {
    let bindings = top_level_bindings(source);
    let Some(binding) = bindings.iter().rev().find(|b| b.name == INPUTS_NAME) else {
        return Ok(None);
    };

    let mut evaluator = Evaluator {
        bindings: &bindings,
        active: HashSet::new(),
    };
    let value = evaluator.evaluate(binding)?;

    let paths = match value {
        Value::Str(path) => vec![path],
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Str(path) => Ok(path),
                other => Err(LiteralError::new(
                    binding.line,
                    format!("INPUTS must only contain strings, found a {}", other.kind()),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(Some(paths))
}

/// Collect every `NAME = ...` statement that starts at column zero, with its
/// continuation lines joined.
pub fn top_level_bindings(source: &str) -> Vec<Binding> {
    let lines: Vec<&str> = source.lines().collect();
    let mut bindings = Vec::new();
    let mut state = LineState::default();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        let starts_statement = state.at_statement_start();
        state.feed(line);
        index += 1;

        if !starts_statement {
            continue;
        }
        let Some((name, rest)) = split_assignment(line) else {
            continue;
        };

        let mut expr = rest.to_string();
        let line_number = index;
        while !state.at_statement_start() && index < lines.len() {
            expr.push('\n');
            expr.push_str(lines[index]);
            state.feed(lines[index]);
            index += 1;
        }

        bindings.push(Binding {
            name: name.to_string(),
            expr,
            line: line_number,
        });
    }

    bindings
}

/// Split `NAME = rest` (optionally `NAME: annotation = rest`) at column zero
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let first = line.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let name_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    let name = &line[..name_end];
    let mut rest = line[name_end..].trim_start();

    if let Some(annotated) = rest.strip_prefix(':') {
        let eq = annotated.find('=')?;
        rest = &annotated[eq..];
    }
    let rest = rest.strip_prefix('=')?;
    if rest.starts_with('=') {
        return None;
    }
    Some((name, rest))
}

struct Evaluator<'a> {
    bindings: &'a [Binding],
    /// Lines of the bindings currently being evaluated
    active: HashSet<usize>,
}

impl Evaluator<'_> {
    fn evaluate(&mut self, binding: &Binding) -> Result<Value, LiteralError> {
        let tokens = tokenize(&binding.expr).map_err(|m| LiteralError::new(binding.line, m))?;
        if !self.active.insert(binding.line) {
            return Err(LiteralError::new(
                binding.line,
                format!("'{}' refers to itself", binding.name),
            ));
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            line: binding.line,
            evaluator: self,
        };
        let value = parser.expression_list()?;
        if parser.pos != tokens.len() {
            return Err(LiteralError::new(
                binding.line,
                format!("unexpected {}", tokens[parser.pos].describe()),
            ));
        }

        self.active.remove(&binding.line);
        Ok(value)
    }

    /// Resolve a name to the latest top-level binding before `line`
    fn lookup(&mut self, name: &str, line: usize) -> Result<Value, LiteralError> {
        let binding = self
            .bindings
            .iter()
            .rev()
            .find(|b| b.name == name && b.line < line)
            .ok_or_else(|| {
                LiteralError::new(
                    line,
                    format!("name '{}' is not bound at top level before use", name),
                )
            })?;
        let binding = binding.clone();
        self.evaluate(&binding)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(String),
    Name(String),
    Open(char),
    Close(char),
    Comma,
    Plus,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Str(_) => "string".to_string(),
            Token::Name(name) => format!("name '{}'", name),
            Token::Open(c) | Token::Close(c) => format!("'{}'", c),
            Token::Comma => "','".to_string(),
            Token::Plus => "'+'".to_string(),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '\\' if chars.get(i + 1) == Some(&'\n') => i += 2,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '[' | '(' => {
                tokens.push(Token::Open(c));
                i += 1;
            }
            ']' | ')' => {
                tokens.push(Token::Close(c));
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '"' | '\'' => {
                let (literal, next) = string_literal(&chars, i, false)?;
                tokens.push(Token::Str(literal));
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();

                // String prefixes: r"..", u"..", and the unsupported f/b forms
                if matches!(chars.get(i), Some('"') | Some('\'')) && word.len() <= 2 {
                    let lower = word.to_ascii_lowercase();
                    if lower.contains('f') {
                        return Err("f-strings are not supported in INPUTS".to_string());
                    }
                    if lower.contains('b') {
                        return Err("bytes literals are not supported in INPUTS".to_string());
                    }
                    if lower.chars().all(|p| p == 'r' || p == 'u') {
                        let (literal, next) = string_literal(&chars, i, lower.contains('r'))?;
                        tokens.push(Token::Str(literal));
                        i = next;
                        continue;
                    }
                }
                tokens.push(Token::Name(word));
            }
            other => return Err(format!("unsupported syntax '{}'", other)),
        }
    }

    Ok(tokens)
}

/// Parse a quoted literal starting at `start`; returns the value and the index
/// just past the closing quote.
fn string_literal(chars: &[char], start: usize, raw: bool) -> Result<(String, usize), String> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };
    let mut value = String::new();

    loop {
        let Some(&c) = chars.get(i) else {
            return Err("unterminated string literal".to_string());
        };
        if c == quote {
            if !triple {
                return Ok((value, i + 1));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((value, i + 3));
            }
        }
        if c == '\n' && !triple {
            return Err("unterminated string literal".to_string());
        }
        if c == '\\' {
            let Some(&next) = chars.get(i + 1) else {
                return Err("unterminated string literal".to_string());
            };
            if raw {
                value.push('\\');
                value.push(next);
            } else {
                match next {
                    '\n' => {}
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' | '\'' | '"' => value.push(next),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            i += 2;
            continue;
        }
        value.push(c);
        i += 1;
    }
}

struct Parser<'t, 'e, 'b> {
    tokens: &'t [Token],
    pos: usize,
    line: usize,
    evaluator: &'e mut Evaluator<'b>,
}

impl Parser<'_, '_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError::new(self.line, message)
    }

    /// `a, b, c` without brackets builds a tuple, like Python does
    fn expression_list(&mut self) -> Result<Value, LiteralError> {
        let first = self.expression()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            if self.peek().is_none() {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Value::List(items))
    }

    fn expression(&mut self) -> Result<Value, LiteralError> {
        let mut value = self.term()?;
        while self.peek() == Some(&Token::Plus) {
            self.pos += 1;
            let rhs = self.term()?;
            value = match (value, rhs) {
                (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
                (Value::List(mut a), Value::List(b)) => {
                    a.extend(b);
                    Value::List(a)
                }
                (a, b) => {
                    return Err(self.error(format!(
                        "cannot concatenate {} and {}",
                        a.kind(),
                        b.kind()
                    )))
                }
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Value, LiteralError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        self.pos += 1;

        match token {
            Token::Str(mut text) => {
                // Adjacent literals concatenate
                while let Some(Token::Str(next)) = self.peek() {
                    text.push_str(next);
                    self.pos += 1;
                }
                Ok(Value::Str(text))
            }
            Token::Name(name) if name == "os.path.join" => self.path_join(),
            Token::Name(name) => {
                if matches!(self.peek(), Some(Token::Open(_))) {
                    return Err(self.error(format!("call to '{}' is not supported", name)));
                }
                if name.contains('.') {
                    return Err(self.error(format!("attribute access '{}' is not supported", name)));
                }
                self.evaluator.lookup(&name, self.line)
            }
            Token::Open('[') => Ok(Value::List(self.items(']')?.0)),
            Token::Open('(') => {
                // `(x)` is grouping, `(x,)` and `()` are tuples
                let (mut items, had_comma) = self.items(')')?;
                if items.len() == 1 && !had_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::List(items))
                }
            }
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    /// Comma separated items up to the closing bracket (consumed), and whether
    /// a separating comma was seen at this level
    fn items(&mut self, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut had_comma = false;
        loop {
            if self.peek() == Some(&Token::Close(close)) {
                self.pos += 1;
                return Ok((items, had_comma));
            }
            items.push(self.expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    had_comma = true;
                    self.pos += 1;
                }
                Some(Token::Close(c)) if *c == close => {}
                Some(other) => {
                    return Err(self.error(format!(
                        "expected ',' or '{}', found {}",
                        close,
                        other.describe()
                    )))
                }
                None => return Err(self.error(format!("missing '{}'", close))),
            }
        }
    }

    fn path_join(&mut self) -> Result<Value, LiteralError> {
        if self.peek() != Some(&Token::Open('(')) {
            return Err(self.error("os.path.join must be called"));
        }
        self.pos += 1;
        let (args, _) = self.items(')')?;
        if args.is_empty() {
            return Err(self.error("os.path.join needs at least one argument"));
        }

        let mut joined = PathBuf::new();
        for arg in args {
            match arg {
                Value::Str(part) => joined.push(part),
                other => {
                    return Err(self.error(format!(
                        "os.path.join arguments must be strings, found a {}",
                        other.kind()
                    )))
                }
            }
        }
        Ok(Value::Str(joined.to_string_lossy().into_owned()))
    }
}
