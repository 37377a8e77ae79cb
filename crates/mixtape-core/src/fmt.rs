//! `Value` -> text, for the `-f`/`-e` CLI flags' "print the top value"
//! behavior (spec §6) and for diagnostic dumps.
//!
//! Scalar and structural values (`Num`, `Nil`, `Str`, `Sym`, `Vec`) print in
//! the same notation the parser accepts, so `load "x.tape"` followed by
//! printing its result round-trips through re-parsing. `Tape`, `Stream`,
//! and `Wavetable` have no literal syntax, so they print as a bracketed
//! descriptor instead.

use crate::value::Value;

fn format_string(s: &str, buf: &mut String) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\t' => buf.push_str("\\t"),
            other => buf.push(other),
        }
    }
    buf.push('"');
}

fn write_value(value: &Value, buf: &mut String) {
    match value {
        Value::Num(n) => {
            let s = n.to_string();
            buf.push_str(&s);
        }
        Value::Nil => buf.push_str("nil"),
        Value::Str(s) => format_string(s, buf),
        Value::Sym(s) => {
            buf.push(':');
            buf.push_str(s);
        }
        Value::Vec(items) => {
            buf.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(' ');
                }
                write_value(item, buf);
            }
            buf.push('}');
        }
        Value::Tape(t) => {
            buf.push_str(&format!("[tape {}ch {}f @{}Hz]", t.nchannels(), t.nframes(), t.sample_rate()));
        }
        Value::Stream(s) => {
            buf.push_str(&format!("[stream {}ch]", s.nchannels()));
        }
        Value::Wavetable(w) => {
            buf.push_str(&format!("[wavetable {} waves x {}]", w.wave_count(), w.wave_len()));
        }
    }
}

/// Renders `value` the way `-f`/`-e` print the top of stack.
pub fn format_value(value: &Value) -> String {
    let mut buf = String::new();
    write_value(value, &mut buf);
    buf
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_value(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_strings_print_as_literals() {
        assert_eq!(format_value(&Value::Num(3.5)), "3.5");
        assert_eq!(format_value(&Value::str("hi")), "\"hi\"");
    }

    #[test]
    fn symbols_print_with_a_leading_colon() {
        assert_eq!(format_value(&Value::sym("dup")), ":dup");
    }

    #[test]
    fn vectors_print_as_braced_sequences() {
        let v = Value::vec(vec![Value::Num(1.0), Value::Num(2.0)]);
        assert_eq!(format_value(&v), "{1 2}");
    }

    #[test]
    fn strings_escape_quotes_and_backslashes() {
        assert_eq!(format_value(&Value::str("a\"b\\c")), "\"a\\\"b\\\\c\"");
    }
}
