//! Generic stack shuffling words (spec §4.7), grounded in the same small
//! vocabulary the teacher's `stack.rs` implements over raw pointers —
//! here just `Vec<Value>` indexing.

use mixtape_core::{Error, Result};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn need(vm: &Vm, word: &str, n: usize) -> Result<()> {
    if vm.stack.len() < n {
        Err(Error::underflow(word, n))
    } else {
        Ok(())
    }
}

fn dup(vm: &mut Vm) -> Result<()> {
    need(vm, "dup", 1)?;
    let v = vm.stack.last().unwrap().clone();
    vm.push(v);
    Ok(())
}

fn drop(vm: &mut Vm) -> Result<()> {
    vm.pop("drop").map(|_| ())
}

fn swap(vm: &mut Vm) -> Result<()> {
    need(vm, "swap", 2)?;
    let n = vm.stack.len();
    vm.stack.swap(n - 1, n - 2);
    Ok(())
}

fn over(vm: &mut Vm) -> Result<()> {
    need(vm, "over", 2)?;
    let v = vm.stack[vm.stack.len() - 2].clone();
    vm.push(v);
    Ok(())
}

fn rot(vm: &mut Vm) -> Result<()> {
    need(vm, "rot", 3)?;
    let n = vm.stack.len();
    vm.stack[n - 3..].rotate_left(1);
    Ok(())
}

fn nip(vm: &mut Vm) -> Result<()> {
    need(vm, "nip", 2)?;
    let n = vm.stack.len();
    vm.stack.remove(n - 2);
    Ok(())
}

fn tuck(vm: &mut Vm) -> Result<()> {
    need(vm, "tuck", 2)?;
    let top = vm.stack.last().unwrap().clone();
    let n = vm.stack.len();
    vm.stack.insert(n - 2, top);
    Ok(())
}

fn two_dup(vm: &mut Vm) -> Result<()> {
    need(vm, "2dup", 2)?;
    let n = vm.stack.len();
    let a = vm.stack[n - 2].clone();
    let b = vm.stack[n - 1].clone();
    vm.push(a);
    vm.push(b);
    Ok(())
}

fn three_drop(vm: &mut Vm) -> Result<()> {
    need(vm, "3drop", 3)?;
    let n = vm.stack.len();
    vm.stack.truncate(n - 3);
    Ok(())
}

fn pick(vm: &mut Vm) -> Result<()> {
    let idx = vm.pop("pick")?.as_num().ok_or_else(|| Error::type_mismatch("pick: index must be a number"))? as usize;
    need(vm, "pick", idx + 1)?;
    let n = vm.stack.len();
    let v = vm.stack[n - 1 - idx].clone();
    vm.push(v);
    Ok(())
}

fn roll(vm: &mut Vm) -> Result<()> {
    let idx = vm.pop("roll")?.as_num().ok_or_else(|| Error::type_mismatch("roll: index must be a number"))? as usize;
    need(vm, "roll", idx + 1)?;
    let n = vm.stack.len();
    let v = vm.stack.remove(n - 1 - idx);
    vm.push(v);
    Ok(())
}

fn depth(vm: &mut Vm) -> Result<()> {
    let n = vm.stack.len() as f64;
    vm.push(mixtape_core::Value::Num(n));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("dup", dup);
    r.register("drop", drop);
    r.register("swap", swap);
    r.register("over", over);
    r.register("rot", rot);
    r.register("nip", nip);
    r.register("tuck", tuck);
    r.register("2dup", two_dup);
    r.register("3drop", three_drop);
    r.register("pick", pick);
    r.register("roll", roll);
    r.register("depth", depth);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_core::{time::Transport, Value};
    use std::rc::Rc;

    fn vm() -> Vm {
        Vm::new(Rc::new(Registry::new()), Transport::new(48000, 120.0, 960), std::env::temp_dir())
    }

    #[test]
    fn swap_exchanges_top_two() {
        let mut m = vm();
        m.push(Value::Num(1.0));
        m.push(Value::Num(2.0));
        swap(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(2.0), Value::Num(1.0)]);
    }

    #[test]
    fn rot_moves_third_to_top() {
        let mut m = vm();
        m.push(Value::Num(1.0));
        m.push(Value::Num(2.0));
        m.push(Value::Num(3.0));
        rot(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(2.0), Value::Num(3.0), Value::Num(1.0)]);
    }

    #[test]
    fn underflow_is_reported() {
        let mut m = vm();
        assert!(matches!(dup(&mut m), Err(Error::ArityUnderflow { .. })));
    }

}
