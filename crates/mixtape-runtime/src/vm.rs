//! The stack-based evaluator (spec §4.6).
//!
//! Execution walks a flat sequence of `Value`s: self-evaluating values
//! (everything except `Sym`) push themselves; a `Sym` is looked up in the
//! word [`crate::dispatch::Registry`] keyed on the dynamic type of the
//! current top-of-stack and invoked. The vector builder `[`/`]` is
//! implemented with an internal mark stack rather than a sentinel value,
//! since `Value` is a closed set with no "marker" variant (spec §3).

use std::rc::Rc;

use mixtape_core::noise::Xorshift32;
use mixtape_core::time::Transport;
use mixtape_core::{CancelToken, Error, Result, Value};

use crate::dispatch::Registry;
use crate::env::EnvStack;

pub struct Vm {
    pub stack: Vec<Value>,
    pub marks: Vec<usize>,
    pub env: EnvStack,
    pub transport: Transport,
    pub cancel: CancelToken,
    pub registry: Rc<Registry>,
    pub asset_dir: std::path::PathBuf,
    /// Backs the `rand`/`rand/seed` words (spec §4.9). Seeded from the
    /// transport's sample rate so a run is reproducible without needing
    /// wall-clock entropy.
    pub rng: Xorshift32,
}

impl Vm {
    pub fn new(registry: Rc<Registry>, transport: Transport, asset_dir: std::path::PathBuf) -> Self {
        let seed = transport.sample_rate;
        Vm {
            stack: Vec::new(),
            marks: Vec::new(),
            env: EnvStack::new(),
            transport,
            cancel: CancelToken::new(),
            registry,
            asset_dir,
            rng: Xorshift32::new(seed),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self, word: &str) -> Result<Value> {
        self.stack.pop().ok_or_else(|| Error::underflow(word, 1))
    }

    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Executes a flat program (a top-level parse or a quotation body).
    pub fn eval(&mut self, program: &[Value]) -> Result<()> {
        for value in program {
            self.eval_one(value)?;
        }
        Ok(())
    }

    fn eval_one(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Sym(name) if name.starts_with(':') => {
                let v = self.env.fetch(name).cloned().unwrap_or(Value::Nil);
                self.push(v);
                Ok(())
            }
            Value::Sym(name) => self.invoke(name),
            other => {
                self.push(other.clone());
                Ok(())
            }
        }
    }

    fn invoke(&mut self, name: &str) -> Result<()> {
        tracing::trace!(word = name, stack_depth = self.stack.len(), "invoke");
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match name {
            "[" => {
                self.marks.push(self.stack.len());
                return Ok(());
            }
            "]" => {
                let mark = self.marks.pop().ok_or_else(|| Error::domain("`]` without a matching `[`"))?;
                let items: Vec<Value> = self.stack.split_off(mark);
                self.push(Value::vec(items));
                return Ok(());
            }
            _ => {}
        }
        let type_name = self.peek().map(|v| v.type_name());
        let word = self
            .registry
            .resolve(type_name, name)
            .ok_or_else(|| Error::unbound(name))?;
        word(self)
    }

    /// Pops a `Vec` quotation and runs it as a sub-program.
    pub fn call_quotation(&mut self, word: &str) -> Result<()> {
        let v = self.pop(word)?;
        let program = v
            .as_vec()
            .ok_or_else(|| Error::type_mismatch(format!("{word}: expected a quotation, got {}", v.type_name())))?
            .clone();
        self.eval(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::words;

    fn vm() -> Vm {
        let mut registry = Registry::new();
        words::register_all(&mut registry);
        Vm::new(Rc::new(registry), Transport::new(48000, 120.0, 960), std::env::temp_dir())
    }

    #[test]
    fn evaluates_simple_arithmetic() {
        let mut m = vm();
        let prog = parse("t", "1 2 +").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Num(3.0)]);
    }

    #[test]
    fn vector_builder_collects_pushed_values() {
        let mut m = vm();
        let prog = parse("t", "[ 1 2 3 ]").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(1.0), Value::Num(2.0), Value::Num(3.0)])]);
    }

    #[test]
    fn colon_symbol_pushes_the_bound_value_or_nil() {
        let mut m = vm();
        let prog = parse("t", "440 \":freq\" set :freq").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Num(440.0)]);

        let mut m2 = vm();
        m2.eval(&parse("t", ":nope").unwrap()).unwrap();
        assert_eq!(m2.stack, vec![Value::Nil]);
    }

    #[test]
    fn unbound_word_is_an_error() {
        let mut m = vm();
        let prog = parse("t", "bogus-word-xyz").unwrap();
        assert!(matches!(m.eval(&prog), Err(Error::Unbound { .. })));
    }
}
