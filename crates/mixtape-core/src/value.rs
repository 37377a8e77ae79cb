//! The Mixtape value model (spec §3).
//!
//! `Value` is a closed tagged variant. Every value is cheaply cloneable:
//! `Num` is inline, everything else shares its interior buffer through an
//! `Rc`. There is no garbage collector — ordinary reference counting is
//! sufficient because quoted programs and tapes never form cycles (nothing
//! in the language can write a `Value` back into a container that value is
//! itself reachable from).
//!
//! Booleans are not a distinct variant: spec §3 encodes them as `Num(-1)`
//! (true) and `Num(0)` (false), Forth-style.

use crate::stream::Stream;
use crate::tape::Tape;
use crate::wavetable::Wavetable;
use std::rc::Rc;

/// A Mixtape runtime value.
#[derive(Clone)]
pub enum Value {
    /// IEEE-754 double. Booleans are `-1.0` (true) / `0.0` (false).
    Num(f64),
    /// The absence of a value; also the sentinel `break` throws.
    Nil,
    /// Immutable UTF-8 string.
    Str(Rc<str>),
    /// An interned word name, e.g. `dup`, `+`, `:freq`.
    Sym(Rc<str>),
    /// Ordered sequence of values. Also the representation of quoted
    /// programs (a `Vec` produced by `{ ... }` or by the parser itself).
    Vec(Rc<Vec<Value>>),
    /// Finite interleaved sample buffer.
    Tape(Tape),
    /// Lazy per-frame generator.
    Stream(Stream),
    /// Mipmapped band-limited wave table.
    Wavetable(Rc<Wavetable>),
}

impl Value {
    pub const TRUE: Value = Value::Num(-1.0);
    pub const FALSE: Value = Value::Num(0.0);

    pub fn bool(b: bool) -> Value {
        if b { Value::TRUE } else { Value::FALSE }
    }

    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn sym(s: impl Into<Rc<str>>) -> Value {
        Value::Sym(s.into())
    }

    pub fn vec(items: Vec<Value>) -> Value {
        Value::Vec(Rc::new(items))
    }

    /// Forth-style truthiness: any non-zero number is true, everything
    /// else that isn't `Nil` is true, `Nil` is false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Nil => false,
            _ => true,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec(&self) -> Option<&Rc<Vec<Value>>> {
        match self {
            Value::Vec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tape(&self) -> Option<&Tape> {
        match self {
            Value::Tape(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The name of this value's type, for error messages and method
    /// dispatch keys.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "Num",
            Value::Nil => "Nil",
            Value::Str(_) => "Str",
            Value::Sym(_) => "Sym",
            Value::Vec(_) => "Vec",
            Value::Tape(_) => "Tape",
            Value::Stream(_) => "Stream",
            Value::Wavetable(_) => "Wavetable",
        }
    }

    /// Anything that can be coerced to an infinite or finite stream:
    /// a bare `Num` is an infinite constant stream (spec §4.4).
    pub fn is_streamable(&self) -> bool {
        matches!(self, Value::Num(_) | Value::Stream(_) | Value::Tape(_))
    }

    pub fn into_stream(self) -> Option<Stream> {
        match self {
            Value::Num(n) => Some(Stream::constant(n)),
            Value::Stream(s) => Some(s),
            Value::Tape(t) => Some(t.into_stream()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::Vec(a), Value::Vec(b)) => a == b,
            (Value::Tape(a), Value::Tape(b)) => a.identity_eq(b),
            (Value::Stream(a), Value::Stream(b)) => a.identity_eq(b),
            (Value::Wavetable(a), Value::Wavetable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Nil => write!(f, "nil"),
            Value::Str(s) => write!(f, "{:?}", s.as_ref()),
            Value::Sym(s) => write!(f, ":{s}"),
            Value::Vec(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                write!(f, "]")
            }
            Value::Tape(t) => write!(f, "<tape {}ch {}f @{}Hz>", t.nchannels(), t.nframes(), t.sample_rate()),
            Value::Stream(s) => write!(f, "<stream {}ch>", s.nchannels()),
            Value::Wavetable(w) => write!(f, "<wavetable {} waves x {}>", w.wave_count(), w.wave_len()),
        }
    }
}
