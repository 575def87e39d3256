//! GDB/MI output record parser
//!
//! One `Record` per line of MI output as spoken on a `new-ui mi` channel:
//! result records (`^done`, `^error`, ...) answering commands, async records
//! (`*stopped`, `=thread-selected`, ...) pushed by the debugger, stream
//! records carrying console/target/log text, and the `(gdb)` ready prompt.
//!
//! Values follow the MI output grammar: c-string constants, `{}` tuples of
//! `name=value` results, and `[]` lists.

use crate::error::{Error, Result};

// =============================================================================
// RECORD TYPES
// =============================================================================

/// One parsed line of MI output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// `[token]^class[,results]` reply to a command we sent.
    Result(ResultRecord),
    /// `*class[,results]` execution state change, e.g. `*stopped`.
    ExecAsync(AsyncRecord),
    /// `=class[,results]` notification, e.g. `=thread-selected`.
    Notify(AsyncRecord),
    /// `+class[,results]` progress report for a long-running operation.
    Status(AsyncRecord),
    /// `~"text"` console output from CLI commands.
    Console(String),
    /// `@"text"` output from the target program.
    Target(String),
    /// `&"text"` debugger log, echoed CLI commands and errors.
    Log(String),
    /// `(gdb)` ready-for-input marker.
    Prompt,
}

/// Reply classes a result record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

/// `[token]^class[,results]`
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub token: Option<u64>,
    pub class: ResultClass,
    pub results: Vec<(String, Value)>,
}

impl ResultRecord {
    /// The `msg` field of an `^error` record, when present.
    pub fn error_message(&self) -> Option<&str> {
        lookup(&self.results, "msg").and_then(Value::as_str)
    }
}

/// Body shared by `*`, `=` and `+` records.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRecord {
    pub token: Option<u64>,
    pub class: String,
    pub results: Vec<(String, Value)>,
}

/// Right-hand side of a `name=value` result.
///
/// Result items inside lists (`[frame={...},frame={...}]`) are kept as
/// single-pair tuples so lists stay homogeneous.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// C-string constant, unescaped.
    Const(String),
    /// `{name=value,...}`
    Tuple(Vec<(String, Value)>),
    /// `[...]`
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Const(s) => Some(s),
            _ => None,
        }
    }

    /// Field access on tuple values.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Tuple(pairs) => lookup(pairs, name),
            _ => None,
        }
    }
}

/// First result with the given name.
pub fn lookup<'a>(results: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    results.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// Returns true for lines that are the pty echoing our own input back.
///
/// Only this process writes to the MI pty, and every line it writes is
/// `[token]-command`, a shape no output record can take.
pub fn is_command_echo(line: &str) -> bool {
    let rest = line.trim_start_matches(|ch: char| ch.is_ascii_digit());
    rest.starts_with('-')
}

/// Escapes text for embedding in a double-quoted MI command argument.
pub fn escape_argument(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

// =============================================================================
// LINE PARSER
// =============================================================================

impl Record {
    /// Parses one line of MI output, without its newline. A trailing `\r`
    /// is tolerated.
    pub fn parse(line: &str) -> Result<Record> {
        Parser::new(line.strip_suffix('\r').unwrap_or(line)).record()
    }
}

/// Pull parser over one line.
struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next().map(|(idx, ch)| {
            self.pos = idx + ch.len_utf8();
            ch
        })
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.advance() {
            Some(ch) if ch == want => Ok(()),
            _ => Err(self.fail(&format!("expected '{want}'"))),
        }
    }

    fn fail(&self, what: &str) -> Error {
        Error::MiParse(format!("{what} at byte {} in {:?}", self.pos, self.input))
    }

    fn record(&mut self) -> Result<Record> {
        if self.input.trim_end() == "(gdb)" {
            return Ok(Record::Prompt);
        }

        let token = self.token();
        let rec = match self.advance() {
            Some('^') => Record::Result(ResultRecord {
                token,
                class: self.result_class()?,
                results: self.results()?,
            }),
            Some('*') => Record::ExecAsync(self.async_record(token)?),
            Some('=') => Record::Notify(self.async_record(token)?),
            Some('+') => Record::Status(self.async_record(token)?),
            Some('~') => Record::Console(self.cstring()?),
            Some('@') => Record::Target(self.cstring()?),
            Some('&') => Record::Log(self.cstring()?),
            _ => return Err(self.fail("unrecognized record")),
        };
        Ok(rec)
    }

    fn token(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return None;
        }
        self.input[start..self.pos].parse().ok()
    }

    fn result_class(&mut self) -> Result<ResultClass> {
        match self.class_word() {
            "done" => Ok(ResultClass::Done),
            "running" => Ok(ResultClass::Running),
            "connected" => Ok(ResultClass::Connected),
            "error" => Ok(ResultClass::Error),
            "exit" => Ok(ResultClass::Exit),
            _ => Err(self.fail("unknown result class")),
        }
    }

    fn async_record(&mut self, token: Option<u64>) -> Result<AsyncRecord> {
        let class = self.class_word();
        if class.is_empty() {
            return Err(self.fail("missing async class"));
        }
        Ok(AsyncRecord {
            token,
            class: class.to_string(),
            results: self.results()?,
        })
    }

    /// Class name: everything up to the next `,` or end of line.
    fn class_word(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch != ',') {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    /// `(,name=value)*` to end of line.
    fn results(&mut self) -> Result<Vec<(String, Value)>> {
        let mut results = Vec::new();
        while self.peek() == Some(',') {
            self.advance();
            results.push(self.result()?);
        }
        match self.peek() {
            None => Ok(results),
            Some(_) => Err(self.fail("trailing input after results")),
        }
    }

    fn result(&mut self) -> Result<(String, Value)> {
        let name = self.name();
        if name.is_empty() {
            return Err(self.fail("expected result name"));
        }
        self.expect('=')?;
        Ok((name.to_string(), self.value()?))
    }

    /// Result names use hyphens, e.g. `thread-id`.
    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some('"') => Ok(Value::Const(self.cstring()?)),
            Some('{') => self.tuple(),
            Some('[') => self.list(),
            _ => Err(self.fail("expected value")),
        }
    }

    fn tuple(&mut self) -> Result<Value> {
        self.expect('{')?;
        let mut pairs = Vec::new();
        if self.peek() != Some('}') {
            loop {
                pairs.push(self.result()?);
                match self.advance() {
                    Some(',') => continue,
                    Some('}') => return Ok(Value::Tuple(pairs)),
                    _ => return Err(self.fail("expected ',' or '}'")),
                }
            }
        }
        self.advance();
        Ok(Value::Tuple(pairs))
    }

    fn list(&mut self) -> Result<Value> {
        self.expect('[')?;
        let mut items = Vec::new();
        if self.peek() != Some(']') {
            loop {
                items.push(self.list_item()?);
                match self.advance() {
                    Some(',') => continue,
                    Some(']') => return Ok(Value::List(items)),
                    _ => return Err(self.fail("expected ',' or ']'")),
                }
            }
        }
        self.advance();
        Ok(Value::List(items))
    }

    fn list_item(&mut self) -> Result<Value> {
        match self.peek() {
            Some('"') | Some('{') | Some('[') => self.value(),
            _ => {
                let (name, value) = self.result()?;
                Ok(Value::Tuple(vec![(name, value)]))
            }
        }
    }

    /// `"..."` with the escapes the debugger emits: `\n`, `\t`, `\"`, `\\`
    /// and octal `\ooo`. One octal escape is one byte of the original
    /// output, so non-ASCII text arrives as runs of escapes; content is
    /// collected as bytes and decoded once at the end.
    fn cstring(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut out = Vec::new();
        loop {
            match self.advance() {
                None => return Err(self.fail("unterminated c-string")),
                Some('"') => return Ok(String::from_utf8_lossy(&out).into_owned()),
                Some('\\') => match self.advance() {
                    None => return Err(self.fail("unterminated escape")),
                    Some('n') => out.push(b'\n'),
                    Some('t') => out.push(b'\t'),
                    Some('r') => out.push(b'\r'),
                    Some('f') => out.push(0x0c),
                    Some('v') => out.push(0x0b),
                    Some('a') => out.push(0x07),
                    Some('b') => out.push(0x08),
                    Some(ch @ '0'..='7') => out.push(self.octal(ch)),
                    Some(ch) => push_char(&mut out, ch),
                },
                Some(ch) => push_char(&mut out, ch),
            }
        }
    }

    /// Up to three octal digits, the first already consumed.
    fn octal(&mut self, first: char) -> u8 {
        let mut code = first as u32 - '0' as u32;
        for _ in 0..2 {
            match self.peek() {
                Some(ch @ '0'..='7') => {
                    code = code * 8 + (ch as u32 - '0' as u32);
                    self.advance();
                }
                _ => break,
            }
        }
        code as u8
    }
}

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

// =============================================================================
// TESTS
// =============================================================================
