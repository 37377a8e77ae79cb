//! Tokenizer and parser (spec §4.1).
//!
//! Mixtape is homoiconic: "compiling" a program just means turning source
//! text into the flat sequence of `Value`s the evaluator walks. A `{ ... }`
//! block nests recursively into a literal `Value::Vec` (a quotation, pushed
//! whole rather than executed) right here at parse time rather than via a
//! quote-depth counter inside the evaluator; the two are behaviorally
//! equivalent for any program that balances its braces, and a
//! recursive-descent block parser is the simpler of the two to get right.
//! `[`/`]` are left as ordinary bare words because the vector builder they
//! implement runs at evaluation time, collecting whatever the enclosed
//! words actually push.
//!
//! Sugars expanded here:
//!   - `:name` is left as a single `Sym(":name")`; the evaluator pushes
//!     whatever is bound under that exact key (colon included) when it
//!     sees a colon-prefixed symbol.
//!   - `@name` expands to `Str("name"), Sym("get")`.
//!   - `>name` expands to `Str("name"), Sym("set")` — the plain form, not
//!     the `swap set` variant; see `DESIGN.md` for the open-question call.
//!     Operators that merely start with `>` (`>=`) are left untouched.
//!   - A numeric literal with a trailing `s`/`b`/`p`/`t` suffix expands to
//!     `Num(x), Sym("seconds"|"beats"|"periods"|"ticks")`.
//!   - `a/b` where both sides parse as numbers is a ratio literal,
//!     evaluating to `a÷b` as a single `Num`.

use std::rc::Rc;

use mixtape_core::{Error, Result, SourcePos, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokKind {
    BraceOpen,
    BraceClose,
    Word,
}

struct Tok {
    kind: TokKind,
    text: String,
    pos: SourcePos,
}

struct Lexer<'a> {
    file: Rc<str>,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    fn new(file: Rc<str>, src: &'a str) -> Self {
        Lexer { file, chars: src.char_indices().peekable(), src, line: 1, col: 1 }
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.file.to_string(), self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next_token(&mut self) -> Result<Option<Tok>> {
        loop {
            match self.peek() {
                None => return Ok(None),
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') | Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let start_pos = self.pos();
        match self.peek() {
            None => Ok(None),
            Some('{') => {
                self.bump();
                Ok(Some(Tok { kind: TokKind::BraceOpen, text: "{".into(), pos: start_pos }))
            }
            Some('}') => {
                self.bump();
                Ok(Some(Tok { kind: TokKind::BraceClose, text: "}".into(), pos: start_pos }))
            }
            Some('"') => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        None => return Err(Error::parse("unterminated string literal", start_pos)),
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some(other) => s.push(other),
                            None => return Err(Error::parse("unterminated string escape", start_pos)),
                        },
                        Some(c) => s.push(c),
                    }
                }
                Ok(Some(Tok { kind: TokKind::Word, text: format!("\"{s}"), pos: start_pos }))
            }
            Some(_) => {
                let start_byte = self.chars.peek().unwrap().0;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' {
                        break;
                    }
                    self.bump();
                }
                let end_byte = self.chars.peek().map(|(i, _)| *i).unwrap_or(self.src.len());
                Ok(Some(Tok { kind: TokKind::Word, text: self.src[start_byte..end_byte].to_string(), pos: start_pos }))
            }
        }
    }
}

/// Parses a full program from source text into a flat sequence of values.
pub fn parse(file: impl Into<Rc<str>>, src: &str) -> Result<Vec<Value>> {
    let file = file.into();
    let mut lexer = Lexer::new(file, src);
    let mut toks = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        toks.push(tok);
    }
    let mut iter = toks.into_iter().peekable();
    let program = parse_sequence(&mut iter, None)?;
    Ok(program)
}

fn parse_sequence(iter: &mut std::iter::Peekable<std::vec::IntoIter<Tok>>, open: Option<SourcePos>) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    loop {
        let Some(tok) = iter.next() else {
            return match open {
                Some(pos) => Err(Error::parse("unterminated { block", pos)),
                None => Ok(out),
            };
        };
        match tok.kind {
            TokKind::BraceClose => {
                if open.is_some() {
                    return Ok(out);
                }
                return Err(Error::parse("unmatched }", tok.pos));
            }
            TokKind::BraceOpen => {
                let inner = parse_sequence(iter, Some(tok.pos))?;
                out.push(Value::vec(inner));
            }
            TokKind::Word => push_word(&mut out, &tok)?,
        }
    }
}

/// Parses `text` as a plain number or an `a/b` ratio. Both sides of a ratio
/// must be non-empty, so a bare `/` (the division word) never matches.
fn parse_number_or_ratio(text: &str) -> Option<f64> {
    if let Ok(n) = text.parse::<f64>() {
        return Some(n);
    }
    let (a, b) = text.split_once('/')?;
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let a: f64 = a.parse().ok()?;
    let b: f64 = b.parse().ok()?;
    if b == 0.0 {
        return None;
    }
    Some(a / b)
}

const TIME_SUFFIXES: &[(char, &str)] = &[('s', "seconds"), ('b', "beats"), ('p', "periods"), ('t', "ticks")];

fn push_word(out: &mut Vec<Value>, tok: &Tok) -> Result<()> {
    let text = tok.text.as_str();
    if let Some(s) = text.strip_prefix('"') {
        out.push(Value::str(s));
        return Ok(());
    }
    if let Some(n) = parse_number_or_ratio(text) {
        out.push(Value::Num(n));
        return Ok(());
    }
    if text.len() > 1 {
        let mut chars = text.chars();
        let suffix = chars.next_back().unwrap();
        let prefix = chars.as_str();
        if let Some((_, word)) = TIME_SUFFIXES.iter().find(|(c, _)| *c == suffix) {
            if let Some(n) = parse_number_or_ratio(prefix) {
                out.push(Value::Num(n));
                out.push(Value::sym(*word));
                return Ok(());
            }
        }
    }
    if text == "@" {
        return Err(Error::parse("empty `@` get sugar", tok.pos.clone()));
    }
    if let Some(name) = text.strip_prefix('@') {
        out.push(Value::str(name));
        out.push(Value::sym("get"));
        return Ok(());
    }
    if text.starts_with('>') && text != ">" && text != ">=" {
        let name = &text[1..];
        out.push(Value::str(name));
        out.push(Value::sym("set"));
        return Ok(());
    }
    if text == ":" {
        return Err(Error::parse("empty symbol literal `:`", tok.pos.clone()));
    }
    out.push(Value::sym(text));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_words() {
        let prog = parse("t", "1 2 +").unwrap();
        assert_eq!(prog, vec![Value::Num(1.0), Value::Num(2.0), Value::sym("+")]);
    }

    #[test]
    fn parses_nested_blocks_as_literal_vecs() {
        let prog = parse("t", "{ dup + }").unwrap();
        assert_eq!(prog.len(), 1);
        assert!(matches!(&prog[0], Value::Vec(v) if v.len() == 2));
    }

    #[test]
    fn colon_symbol_is_a_single_token() {
        let prog = parse("t", ":freq").unwrap();
        assert_eq!(prog, vec![Value::sym(":freq")]);
    }

    #[test]
    fn set_sugar_expands_to_str_then_set() {
        let prog = parse("t", ">:freq").unwrap();
        assert_eq!(prog, vec![Value::str(":freq"), Value::sym("set")]);
    }

    #[test]
    fn get_sugar_expands_to_str_then_get() {
        let prog = parse("t", "@freq").unwrap();
        assert_eq!(prog, vec![Value::str("freq"), Value::sym("get")]);
    }

    #[test]
    fn greater_equal_is_not_treated_as_set_sugar() {
        let prog = parse("t", "1 2 >=").unwrap();
        assert_eq!(prog, vec![Value::Num(1.0), Value::Num(2.0), Value::sym(">=")]);
    }

    #[test]
    fn time_suffix_expands_to_num_then_word() {
        let prog = parse("t", "1b").unwrap();
        assert_eq!(prog, vec![Value::Num(1.0), Value::sym("beats")]);
    }

    #[test]
    fn ratio_literal_divides_at_parse_time() {
        let prog = parse("t", "1/2").unwrap();
        assert_eq!(prog, vec![Value::Num(0.5)]);
    }

    #[test]
    fn division_word_alone_is_still_a_symbol() {
        let prog = parse("t", "4 2 /").unwrap();
        assert_eq!(prog, vec![Value::Num(4.0), Value::Num(2.0), Value::sym("/")]);
    }

    #[test]
    fn comments_are_ignored() {
        let prog = parse("t", "1 # a comment\n2 ; another\n3").unwrap();
        assert_eq!(prog, vec![Value::Num(1.0), Value::Num(2.0), Value::Num(3.0)]);
    }

    #[test]
    fn unterminated_string_is_a_parse_error() {
        assert!(parse("t", "\"unterminated").is_err());
    }

    #[test]
    fn unmatched_brace_is_a_parse_error() {
        assert!(parse("t", "dup }").is_err());
        assert!(parse("t", "{ dup").is_err());
    }
}
