//! Control flow: quotations are ordinary `Vec` values, so `if`/`cond`/
//! `loop` all work by popping one or more quotations off the stack and
//! handing them to [`Vm::eval`] (spec §4.2, §4.6). `break` throws the
//! `Nil` sentinel value (spec §3); `loop` is the only word that catches
//! it, everything else treats a `Nil` throw like any other.

use mixtape_core::{Error, Result, Value};

use crate::dispatch::Registry;
use crate::env::EnvFrame;
use crate::vm::Vm;

fn pop_quotation(vm: &mut Vm, word: &str) -> Result<Vec<Value>> {
    let v = vm.pop(word)?;
    v.as_vec()
        .map(|rc| rc.as_ref().clone())
        .ok_or_else(|| Error::type_mismatch(format!("{word}: expected a quotation, got {}", v.type_name())))
}

fn call(vm: &mut Vm) -> Result<()> {
    let program = pop_quotation(vm, "call")?;
    vm.eval(&program)
}

/// `if` is a method on `Num` with two stack shapes (spec §4.2): the
/// arity-2 form `( cond {then} -- )` and the arity-3 form
/// `( cond {then} {else} -- )`. Since whichever quotation sits on top is
/// ambiguous between the two forms until we look at what's under it, this
/// peeks rather than dispatching on a fixed arity.
fn if_word(vm: &mut Vm) -> Result<()> {
    let first = pop_quotation(vm, "if")?;
    if matches!(vm.peek(), Some(Value::Vec(_))) {
        let then_q = pop_quotation(vm, "if")?;
        let cond = vm.pop("if")?;
        vm.eval(if cond.truthy() { &then_q } else { &first })
    } else {
        let cond = vm.pop("if")?;
        if cond.truthy() {
            vm.eval(&first)
        } else {
            Ok(())
        }
    }
}

/// `(` pushes a fresh environment frame; `)` pops it. Popping the root
/// frame is an error (spec §4.2).
fn open_env(vm: &mut Vm) -> Result<()> {
    vm.env.push(EnvFrame::new());
    Ok(())
}

fn close_env(vm: &mut Vm) -> Result<()> {
    vm.env.pop().map(|_| ()).ok_or_else(|| Error::domain("`)`: cannot pop the root environment"))
}

fn cond(vm: &mut Vm) -> Result<()> {
    let n = vm
        .pop("cond")?
        .as_num()
        .ok_or_else(|| Error::type_mismatch("cond: expected a pair count"))? as usize;
    let mut pairs = Vec::with_capacity(n);
    for _ in 0..n {
        let body = pop_quotation(vm, "cond")?;
        let pred = pop_quotation(vm, "cond")?;
        pairs.push((pred, body));
    }
    pairs.reverse();
    for (pred, body) in pairs {
        vm.eval(&pred)?;
        let matched = vm.pop("cond")?.truthy();
        if matched {
            return vm.eval(&body);
        }
    }
    Err(Error::domain("cond: no predicate matched"))
}

fn loop_word(vm: &mut Vm) -> Result<()> {
    let body = pop_quotation(vm, "loop")?;
    loop {
        let snapshot = vm.stack.len();
        match vm.eval(&body) {
            Ok(()) => continue,
            Err(Error::Thrown { value, .. }) if value.is_nil() => {
                vm.stack.truncate(snapshot);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

fn break_word(_vm: &mut Vm) -> Result<()> {
    Err(Error::thrown(Value::Nil))
}

fn throw(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("throw")?;
    Err(Error::thrown(v))
}

/// `catch ({body} -- result-or-Nil)`: on a normal return leaves exactly
/// `Nil`; on a throw, restores the value-stack snapshot taken before
/// `body` ran (discarding whatever the aborted body left behind) and
/// pushes the thrown value (spec §4.2).
fn catch(vm: &mut Vm) -> Result<()> {
    let body = pop_quotation(vm, "catch")?;
    let snapshot = vm.stack.len();
    match vm.eval(&body) {
        Ok(()) => {
            vm.push(Value::Nil);
            Ok(())
        }
        Err(Error::Thrown { value, .. }) => {
            vm.stack.truncate(snapshot);
            vm.push(value);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub fn register(r: &mut Registry) {
    r.register("call", call);
    r.register("if", if_word);
    r.register("cond", cond);
    r.register("loop", loop_word);
    r.register("break", break_word);
    r.register("throw", throw);
    r.register("catch", catch);
    r.register("(", open_env);
    r.register(")", close_env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::words;
    use mixtape_core::time::Transport;
    use std::rc::Rc;

    fn vm() -> Vm {
        let mut registry = Registry::new();
        words::register_all(&mut registry);
        Vm::new(Rc::new(registry), Transport::new(48000, 120.0, 960), std::env::temp_dir())
    }

    #[test]
    fn if_picks_the_right_branch() {
        let mut m = vm();
        let prog = parse("t", "1 1 = { \"yes\" } { \"no\" } if").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::str("yes")]);
    }

    #[test]
    fn catch_traps_a_thrown_value() {
        let mut m = vm();
        let prog = parse("t", "{ \"boom\" throw } catch").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::str("boom")]);
    }

    #[test]
    fn catch_leaves_nil_when_the_body_does_not_throw() {
        let mut m = vm();
        let prog = parse("t", "{ \"ok\" } catch").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Nil]);
    }

    #[test]
    fn catch_discards_the_aborted_body_s_partial_stack_effects() {
        let mut m = vm();
        let prog = parse("t", "{ 1 2 \"err\" throw } catch").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::str("err")]);
    }

    #[test]
    fn break_stops_a_loop() {
        let mut m = vm();
        m.push(Value::Num(0.0));
        let prog = parse("t", "{ 1 + dup 3 = { break } { } if } loop").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Num(3.0)]);
    }

    #[test]
    fn two_arg_if_runs_only_when_true() {
        let mut m = vm();
        let prog = parse("t", "1 1 = { \"yes\" } if").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::str("yes")]);

        let mut m2 = vm();
        let prog2 = parse("t", "1 2 = { \"yes\" } if").unwrap();
        m2.eval(&prog2).unwrap();
        assert!(m2.stack.is_empty());
    }

    #[test]
    fn parens_scope_a_binding_away_from_the_outer_env() {
        let mut m = vm();
        m.eval(&parse("t", "100 \":bpm\" set").unwrap()).unwrap();
        let prog = parse("t", "( 200 \":bpm\" set :bpm )").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Num(200.0)]);
        m.stack.clear();
        m.eval(&parse("t", ":bpm").unwrap()).unwrap();
        assert_eq!(m.stack, vec![Value::Num(100.0)]);
    }

    #[test]
    fn cond_runs_the_first_matching_branch() {
        let mut m = vm();
        let prog = parse("t", "{ 1 1 = } { \"a\" } { 1 1 = } { \"b\" } 2 cond").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::str("a")]);
    }
}
