//! String, symbol, and environment words (spec §4.1, §4.2).
//!
//! `set`/`get` back the `>name`/`@name` parser sugar (see `crate::parser`)
//! and bind into the innermost environment frame, per spec §4.2's scoped
//! environment words. `sym`/`fetch`/`bind` remain as the lower-level,
//! explicit-key primitives `set`/`get` are built from.

use mixtape_core::{Error, Result, Value};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn sym(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("sym")?;
    let s = v.as_str().ok_or_else(|| Error::type_mismatch("sym: expected a string"))?;
    vm.push(Value::sym(s));
    Ok(())
}

fn fetch(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("fetch")?;
    let name = v.as_str().ok_or_else(|| Error::type_mismatch("fetch: expected a symbol"))?;
    let value = vm.env.fetch(name).cloned().ok_or_else(|| Error::unbound(name))?;
    vm.push(value);
    Ok(())
}

fn bind(vm: &mut Vm) -> Result<()> {
    let value = vm.pop("bind")?;
    let name_v = vm.pop("bind")?;
    let name = name_v.as_str().ok_or_else(|| Error::type_mismatch("bind: expected a symbol"))?;
    vm.env.bind(name.into(), value);
    Ok(())
}

/// `( value "name" -- )` — binds `value` under `name` in the innermost
/// environment frame (spec §4.2: "`set` binds in the innermost env").
fn set(vm: &mut Vm) -> Result<()> {
    let name_v = vm.pop("set")?;
    let value = vm.pop("set")?;
    let name = name_v.as_str().ok_or_else(|| Error::type_mismatch("set: expected a name string"))?;
    vm.env.bind(name.into(), value);
    Ok(())
}

/// `( "name" -- value )` — looks up `name` from innermost to root, pushing
/// `Nil` if it is unbound (spec §4.2: "`get` returns the bound value or
/// `Nil`"), unlike `fetch` which errors.
fn get(vm: &mut Vm) -> Result<()> {
    let name_v = vm.pop("get")?;
    let name = name_v.as_str().ok_or_else(|| Error::type_mismatch("get: expected a name string"))?;
    vm.push(vm.env.fetch(name).cloned().unwrap_or(Value::Nil));
    Ok(())
}

fn str_concat(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("++")?;
    let a = vm.pop("++")?;
    let a = a.as_str().ok_or_else(|| Error::type_mismatch("++: expected a string"))?;
    let b = b.as_str().ok_or_else(|| Error::type_mismatch("++: expected a string"))?;
    vm.push(Value::str(format!("{a}{b}")));
    Ok(())
}

/// `path/join (a b -- joined)`: joins two path segments with a single
/// `/`, regardless of whether either side already carries one.
fn path_join(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("path/join")?;
    let a = vm.pop("path/join")?;
    let a = a.as_str().ok_or_else(|| Error::type_mismatch("path/join: expected a string"))?;
    let b = b.as_str().ok_or_else(|| Error::type_mismatch("path/join: expected a string"))?;
    let joined = format!("{}/{}", a.trim_end_matches('/'), b.trim_start_matches('/'));
    vm.push(Value::str(joined));
    Ok(())
}

/// `parse (source filename -- Vec)`: the parser's own contract
/// (spec §4.1), exposed as a word so programs can build and inspect
/// quotations from text without evaluating them.
fn parse_word(vm: &mut Vm) -> Result<()> {
    let filename_v = vm.pop("parse")?;
    let filename = filename_v.as_str().ok_or_else(|| Error::type_mismatch("parse: expected a filename string"))?.to_string();
    let source_v = vm.pop("parse")?;
    let source = source_v.as_str().ok_or_else(|| Error::type_mismatch("parse: expected a source string"))?;
    let program = crate::parser::parse(filename, source)?;
    vm.push(Value::vec(program));
    Ok(())
}

/// `parse1 (source filename --)`: parses and immediately evaluates the
/// source against the running VM, leaving whatever the program itself
/// leaves behind.
fn parse1_word(vm: &mut Vm) -> Result<()> {
    let filename_v = vm.pop("parse1")?;
    let filename = filename_v.as_str().ok_or_else(|| Error::type_mismatch("parse1: expected a filename string"))?.to_string();
    let source_v = vm.pop("parse1")?;
    let source = source_v.as_str().ok_or_else(|| Error::type_mismatch("parse1: expected a source string"))?;
    let program = crate::parser::parse(filename, source)?;
    vm.eval(&program)
}

fn str_len(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("str-len")?;
    let s = v.as_str().ok_or_else(|| Error::type_mismatch("str-len: expected a string"))?;
    vm.push(Value::Num(s.chars().count() as f64));
    Ok(())
}

fn to_str(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("to-str")?;
    vm.push(Value::str(format!("{v:?}")));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("sym", sym);
    r.register("fetch", fetch);
    r.register("bind", bind);
    r.register("set", set);
    r.register("get", get);
    r.register("++", str_concat);
    r.register_for("Str", "+", str_concat);
    r.register("str-len", str_len);
    r.register("to-str", to_str);
    r.register("path/join", path_join);
    r.register("parse", parse_word);
    r.register("parse1", parse1_word);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_core::time::Transport;
    use std::rc::Rc;

    fn vm() -> Vm {
        Vm::new(Rc::new(Registry::new()), Transport::new(48000, 120.0, 960), std::env::temp_dir())
    }

    #[test]
    fn bind_then_fetch_round_trips() {
        let mut m = vm();
        m.push(Value::str("freq"));
        m.push(Value::Num(440.0));
        bind(&mut m).unwrap();
        m.push(Value::str("freq"));
        fetch(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(440.0)]);
    }

    #[test]
    fn fetch_of_unbound_name_errors() {
        let mut m = vm();
        m.push(Value::str("nope"));
        assert!(matches!(fetch(&mut m), Err(Error::Unbound { .. })));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut m = vm();
        m.push(Value::Num(440.0));
        m.push(Value::str(":freq"));
        set(&mut m).unwrap();
        m.push(Value::str(":freq"));
        get(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(440.0)]);
    }

    #[test]
    fn get_of_unbound_name_is_nil_not_an_error() {
        let mut m = vm();
        m.push(Value::str(":nope"));
        get(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Nil]);
    }

    #[test]
    fn path_join_inserts_exactly_one_separator() {
        let mut m = vm();
        m.push(Value::str("a/"));
        m.push(Value::str("/b"));
        path_join(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::str("a/b")]);
    }

    #[test]
    fn parse_returns_a_quotation_without_running_it() {
        let mut m = vm();
        m.push(Value::str("1 2 +"));
        m.push(Value::str("t"));
        parse_word(&mut m).unwrap();
        assert!(matches!(m.stack[0], Value::Vec(_)));
    }

    #[test]
    fn parse1_parses_and_runs_in_one_step() {
        let mut reg = Registry::new();
        crate::words::register_all(&mut reg);
        let mut m = Vm::new(Rc::new(reg), Transport::new(48000, 120.0, 960), std::env::temp_dir());
        m.push(Value::str("1 2 +"));
        m.push(Value::str("t"));
        parse1_word(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(3.0)]);
    }
}
