//! `Vec` words (spec §4.7). Quotations are `Vec` values too, so `call`
//! (in `control.rs`) and these words share the same representation —
//! nothing stops a program from building a quotation with `vec-push` and
//! `call`-ing it.

use mixtape_core::{Error, Result, Tape, Value};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn as_vec(v: &Value, word: &str) -> Result<std::rc::Rc<Vec<Value>>> {
    v.as_vec().cloned().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a vector")))
}

/// `clone (v -- v v)`: duplicates the top value. Since `Value` clones are
/// already cheap (`Rc`-backed for `Vec`/`Tape`/`Stream`), this is
/// `dup` under the spec's vector-methods name (spec §4.9).
fn clone_word(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("clone")?;
    vm.push(v.clone());
    vm.push(v);
    Ok(())
}

/// `pop (vec -- vec' item)`: removes and returns the last element.
fn pop_word(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("pop")?;
    let mut items = as_vec(&v, "pop")?.as_ref().clone();
    let item = items.pop().ok_or_else(|| Error::domain("pop: empty vector"))?;
    vm.push(Value::vec(items));
    vm.push(item);
    Ok(())
}

/// `step (vec n -- vec')`: every `n`th element, starting at the first.
fn step_word(vm: &mut Vm) -> Result<()> {
    let n = vm.pop("step")?.as_num().ok_or_else(|| Error::type_mismatch("step: expected a stride"))? as usize;
    if n == 0 {
        return Err(Error::domain("step: stride must be nonzero"));
    }
    let items = as_vec(&vm.pop("step")?, "step")?;
    vm.push(Value::vec(items.iter().step_by(n).cloned().collect()));
    Ok(())
}

/// `tape (vec -- Tape)`: builds a mono tape from a vector of sample
/// values at the transport's sample rate.
fn tape_word(vm: &mut Vm) -> Result<()> {
    let items = as_vec(&vm.pop("tape")?, "tape")?;
    let samples: Vec<f64> = items.iter().map(|v| v.as_num().ok_or_else(|| Error::type_mismatch("tape: expected a vector of numbers"))).collect::<Result<_>>()?;
    vm.push(Value::Tape(Tape::mono(vm.transport.sample_rate, samples)));
    Ok(())
}

/// `vdup (vec n -- vec')`: repeats each element `n` times in place.
fn vdup_word(vm: &mut Vm) -> Result<()> {
    let n = vm.pop("vdup")?.as_num().ok_or_else(|| Error::type_mismatch("vdup: expected a repeat count"))? as usize;
    let items = as_vec(&vm.pop("vdup")?, "vdup")?;
    let mut out = Vec::with_capacity(items.len() * n);
    for item in items.iter() {
        for _ in 0..n {
            out.push(item.clone());
        }
    }
    vm.push(Value::vec(out));
    Ok(())
}

/// `val (vec idx -- vec item)`: like `at`, but leaves the vector on the
/// stack for chaining.
fn val_word(vm: &mut Vm) -> Result<()> {
    let idx = vm.pop("val")?.as_num().ok_or_else(|| Error::type_mismatch("val: expected an index"))? as usize;
    let v = vm.pop("val")?;
    let items = as_vec(&v, "val")?;
    let item = items.get(idx).cloned().ok_or_else(|| Error::domain(format!("val: index {idx} out of range")))?;
    vm.push(v);
    vm.push(item);
    Ok(())
}

fn vec_len(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("vec-len")?;
    let items = as_vec(&v, "vec-len")?;
    vm.push(Value::Num(items.len() as f64));
    Ok(())
}

/// `len (Stream -- n)`: the stream's hinted frame count, or `0` for an
/// infinite/unknown-length stream (spec line 91: `len` is also a
/// `Stream` method).
fn stream_len(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("len")?;
    let s = v.as_stream().ok_or_else(|| Error::type_mismatch("len: expected a stream"))?;
    vm.push(Value::Num(s.nframes_hint() as f64));
    Ok(())
}

fn vec_get(vm: &mut Vm) -> Result<()> {
    let idx = vm.pop("vec-get")?.as_num().ok_or_else(|| Error::type_mismatch("vec-get: expected an index"))? as usize;
    let v = vm.pop("vec-get")?;
    let items = as_vec(&v, "vec-get")?;
    let item = items.get(idx).cloned().ok_or_else(|| Error::domain(format!("vec-get: index {idx} out of range")))?;
    vm.push(item);
    Ok(())
}

fn vec_push(vm: &mut Vm) -> Result<()> {
    let item = vm.pop("vec-push")?;
    let v = vm.pop("vec-push")?;
    let mut items = as_vec(&v, "vec-push")?.as_ref().clone();
    items.push(item);
    vm.push(Value::vec(items));
    Ok(())
}

fn vec_concat(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("vec-concat")?;
    let a = vm.pop("vec-concat")?;
    let mut items = as_vec(&a, "vec-concat")?.as_ref().clone();
    items.extend(as_vec(&b, "vec-concat")?.as_ref().clone());
    vm.push(Value::vec(items));
    Ok(())
}

fn vec_reverse(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("vec-reverse")?;
    let mut items = as_vec(&v, "vec-reverse")?.as_ref().clone();
    items.reverse();
    vm.push(Value::vec(items));
    Ok(())
}

fn vec_first(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("vec-first")?;
    let items = as_vec(&v, "vec-first")?;
    let item = items.first().cloned().ok_or_else(|| Error::domain("vec-first: empty vector"))?;
    vm.push(item);
    Ok(())
}

fn as_quotation(v: &Value, word: &str) -> Result<Vec<Value>> {
    v.as_vec().map(|rc| rc.as_ref().clone()).ok_or_else(|| Error::type_mismatch(format!("{word}: expected a quotation")))
}

/// `map (vec quote -- vec)`: evaluates `quote` once per element with the
/// element on top of stack, collecting whatever it leaves behind.
fn map(vm: &mut Vm) -> Result<()> {
    let quote = as_quotation(&vm.pop("map")?, "map")?;
    let items = as_vec(&vm.pop("map")?, "map")?;
    let mut out = Vec::with_capacity(items.len());
    for item in items.iter() {
        vm.push(item.clone());
        vm.eval(&quote)?;
        out.push(vm.pop("map")?);
    }
    vm.push(Value::vec(out));
    Ok(())
}

/// `reduce (vec quote -- value)`: folds left, using the first element as
/// the seed.
fn reduce(vm: &mut Vm) -> Result<()> {
    let quote = as_quotation(&vm.pop("reduce")?, "reduce")?;
    let items = as_vec(&vm.pop("reduce")?, "reduce")?;
    let mut iter = items.iter();
    let mut acc = iter.next().cloned().ok_or_else(|| Error::domain("reduce: empty vector"))?;
    for item in iter {
        vm.push(acc);
        vm.push(item.clone());
        vm.eval(&quote)?;
        acc = vm.pop("reduce")?;
    }
    vm.push(acc);
    Ok(())
}

/// `each (vec quote --)`: runs `quote` once per element for side effects;
/// whatever it leaves on the stack accumulates across iterations.
fn each(vm: &mut Vm) -> Result<()> {
    let quote = as_quotation(&vm.pop("each")?, "each")?;
    let items = as_vec(&vm.pop("each")?, "each")?;
    for item in items.iter() {
        vm.push(item.clone());
        vm.eval(&quote)?;
    }
    Ok(())
}

/// `partition (vec quote -- matched unmatched)`: splits by the
/// truthiness of `quote`'s result for each element.
fn partition(vm: &mut Vm) -> Result<()> {
    let quote = as_quotation(&vm.pop("partition")?, "partition")?;
    let items = as_vec(&vm.pop("partition")?, "partition")?;
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for item in items.iter() {
        vm.push(item.clone());
        vm.eval(&quote)?;
        if vm.pop("partition")?.truthy() {
            matched.push(item.clone());
        } else {
            unmatched.push(item.clone());
        }
    }
    vm.push(Value::vec(matched));
    vm.push(Value::vec(unmatched));
    Ok(())
}

/// `zip (vec-a vec-b -- vec)`: pairs elements positionally into
/// 2-element vectors, stopping at the shorter input.
fn zip(vm: &mut Vm) -> Result<()> {
    let b = as_vec(&vm.pop("zip")?, "zip")?;
    let a = as_vec(&vm.pop("zip")?, "zip")?;
    let pairs = a.iter().zip(b.iter()).map(|(x, y)| Value::vec(vec![x.clone(), y.clone()])).collect();
    vm.push(Value::vec(pairs));
    Ok(())
}

/// `seq (n -- vec)`: the vector `[0, 1, ..., n-1]`.
fn seq(vm: &mut Vm) -> Result<()> {
    let n = vm.pop("seq")?.as_num().ok_or_else(|| Error::type_mismatch("seq: expected a count"))? as usize;
    vm.push(Value::vec((0..n).map(|i| Value::Num(i as f64)).collect()));
    Ok(())
}

fn iterable_elements(v: &Value, word: &str) -> Result<Vec<Value>> {
    match v {
        Value::Num(n) => Ok((0..(*n as i64).max(0)).map(|i| Value::Num(i as f64)).collect()),
        Value::Vec(items) => Ok(items.as_ref().clone()),
        other => Err(Error::type_mismatch(format!("{word}: expected a Num range or a Vec, got {}", other.type_name()))),
    }
}

/// `for (iterable quote --)`: runs `quote` once per element of `iterable`
/// (spec §4.2's iteration protocol, collapsed to a single direct word
/// rather than the separate `iter`/`next` callable-value dance, since
/// `Value` has no closure variant to hold iterator state in).
fn for_word(vm: &mut Vm) -> Result<()> {
    let quote = as_quotation(&vm.pop("for")?, "for")?;
    let target = vm.pop("for")?;
    let items = iterable_elements(&target, "for")?;
    for item in items {
        vm.push(item);
        vm.eval(&quote)?;
    }
    Ok(())
}

/// `iter (iterable -- iterator)`: realizes an iterable into its element
/// vector upfront — a `Vec` doubling as the iterator state that `next`
/// consumes from the front.
fn iter(vm: &mut Vm) -> Result<()> {
    let target = vm.pop("iter")?;
    let items = iterable_elements(&target, "iter")?;
    vm.push(Value::vec(items));
    Ok(())
}

/// `next (iterator -- iterator' element-or-nil)`: pops the front element
/// off the iterator vector, pushing the shortened iterator back followed
/// by the element (or `Nil` once exhausted).
fn next(vm: &mut Vm) -> Result<()> {
    let items = as_vec(&vm.pop("next")?, "next")?;
    if items.is_empty() {
        vm.push(Value::vec(vec![]));
        vm.push(Value::Nil);
    } else {
        let mut rest = items.as_ref().clone();
        let head = rest.remove(0);
        vm.push(Value::vec(rest));
        vm.push(head);
    }
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("vec-len", vec_len);
    r.register("vec-get", vec_get);
    r.register("vec-push", vec_push);
    r.register("vec-concat", vec_concat);
    r.register("vec-reverse", vec_reverse);
    r.register("vec-first", vec_first);
    r.register_for("Vec", "len", vec_len);
    r.register_for("Stream", "len", stream_len);
    r.register_for("Vec", "size", vec_len);
    r.register_for("Vec", "n", vec_len);
    r.register("push", vec_push);
    r.register_for("Vec", "clone", clone_word);
    r.register_for("Vec", "pop", pop_word);
    r.register("step", step_word);
    r.register("tape", tape_word);
    r.register("vdup", vdup_word);
    r.register("val", val_word);
    r.register("map", map);
    r.register("reduce", reduce);
    r.register("each", each);
    r.register("partition", partition);
    r.register("zip", zip);
    r.register("seq", seq);
    r.register("for", for_word);
    r.register("iter", iter);
    r.register("next", next);
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
    fn push_then_get_round_trips() {
        let mut m = vm();
        m.push(Value::vec(vec![]));
        m.push(Value::Num(7.0));
        vec_push(&mut m).unwrap();
        m.push(Value::Num(0.0));
        vec_get(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(7.0)]);
    }

    #[test]
    fn concat_preserves_order() {
        let mut m = vm();
        m.push(Value::vec(vec![Value::Num(1.0)]));
        m.push(Value::vec(vec![Value::Num(2.0)]));
        vec_concat(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(1.0), Value::Num(2.0)])]);
    }

    fn full_vm() -> Vm {
        let mut reg = Registry::new();
        crate::words::register_all(&mut reg);
        Vm::new(Rc::new(reg), Transport::new(48000, 120.0, 960), std::env::temp_dir())
    }

    #[test]
    fn map_adds_ten_to_each_element() {
        let mut m = full_vm();
        let prog = crate::parser::parse("t", "[1 2 3] { 10 + } map").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(11.0), Value::Num(12.0), Value::Num(13.0)])]);
    }

    #[test]
    fn reduce_sums_with_plus() {
        let mut m = full_vm();
        let prog = crate::parser::parse("t", "[2 3 4] { + } reduce").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Num(9.0)]);
    }

    #[test]
    fn seq_builds_a_zero_based_range() {
        let mut m = vm();
        m.push(Value::Num(3.0));
        seq(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(0.0), Value::Num(1.0), Value::Num(2.0)])]);
    }

    #[test]
    fn next_consumes_from_the_front_and_yields_nil_at_end() {
        let mut m = vm();
        m.push(Value::Num(2.0));
        iter(&mut m).unwrap();
        next(&mut m).unwrap();
        assert_eq!(m.pop("t").unwrap(), Value::Num(0.0));
        next(&mut m).unwrap();
        assert_eq!(m.pop("t").unwrap(), Value::Num(1.0));
        next(&mut m).unwrap();
        assert_eq!(m.pop("t").unwrap(), Value::Nil);
    }

    #[test]
    fn clone_word_duplicates_the_top_vector() {
        let mut m = vm();
        m.push(Value::vec(vec![Value::Num(1.0)]));
        clone_word(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(1.0)]), Value::vec(vec![Value::Num(1.0)])]);
    }

    #[test]
    fn pop_word_removes_the_last_element() {
        let mut m = vm();
        m.push(Value::vec(vec![Value::Num(1.0), Value::Num(2.0)]));
        pop_word(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(1.0)]), Value::Num(2.0)]);
    }

    #[test]
    fn pop_word_on_empty_vector_is_a_domain_error() {
        let mut m = vm();
        m.push(Value::vec(vec![]));
        assert!(matches!(pop_word(&mut m), Err(Error::DomainError { .. })));
    }

    #[test]
    fn step_word_selects_every_nth_element() {
        let mut m = vm();
        m.push(Value::vec((0..6).map(|i| Value::Num(i as f64)).collect()));
        m.push(Value::Num(2.0));
        step_word(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(0.0), Value::Num(2.0), Value::Num(4.0)])]);
    }

    #[test]
    fn tape_word_builds_a_mono_tape_from_samples() {
        let mut m = vm();
        m.push(Value::vec(vec![Value::Num(0.5), Value::Num(-0.5)]));
        tape_word(&mut m).unwrap();
        let t = m.pop("t").unwrap().as_tape().cloned().unwrap();
        assert_eq!(t.nframes(), 2);
        assert_eq!(t.nchannels(), 1);
    }

    #[test]
    fn vdup_word_repeats_each_element_in_place() {
        let mut m = vm();
        m.push(Value::vec(vec![Value::Num(1.0), Value::Num(2.0)]));
        m.push(Value::Num(2.0));
        vdup_word(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(1.0), Value::Num(1.0), Value::Num(2.0), Value::Num(2.0)])]);
    }

    #[test]
    fn val_word_leaves_the_vector_for_chaining() {
        let mut m = vm();
        m.push(Value::vec(vec![Value::Num(7.0), Value::Num(8.0)]));
        m.push(Value::Num(1.0));
        val_word(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::vec(vec![Value::Num(7.0), Value::Num(8.0)]), Value::Num(8.0)]);
    }

    #[test]
    fn len_size_and_n_all_agree_with_vec_len() {
        let mut m = full_vm();
        let prog = crate::parser::parse("t", "[1 2 3] len [1 2 3] size [1 2 3] n").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack, vec![Value::Num(3.0), Value::Num(3.0), Value::Num(3.0)]);
    }

    #[test]
    fn stream_len_reports_the_nframes_hint() {
        let mut m = full_vm();
        m.push(Value::Stream(mixtape_core::Stream::constant(1.0).take(5)));
        m.eval(&[Value::sym("len")]).unwrap();
        assert_eq!(m.stack, vec![Value::Num(5.0)]);
    }
}
