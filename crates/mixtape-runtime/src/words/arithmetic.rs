//! Numeric and logical words (spec §4.7).
//!
//! Booleans are `Num(-1.0)`/`Num(0.0)` (spec §3), so the comparison and
//! logic words live here rather than in a separate boolean module.

use mixtape_core::{Error, Result, Value};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn pop_num(vm: &mut Vm, word: &str) -> Result<f64> {
    vm.pop(word)?.as_num().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number")))
}

macro_rules! binop {
    ($name:ident, $word:expr, $op:expr) => {
        fn $name(vm: &mut Vm) -> Result<()> {
            let b = pop_num(vm, $word)?;
            let a = pop_num(vm, $word)?;
            vm.push(Value::Num($op(a, b)));
            Ok(())
        }
    };
}

binop!(min, "min", f64::min);
binop!(max, "max", f64::max);

/// Pops `a`/`b`, dispatching to `Stream::combine` (spec §4.4: a bare
/// `Num` widens to an infinite constant stream) whenever either operand
/// isn't a plain `Num`, otherwise does the ordinary scalar op. `guard`
/// runs only on the scalar path, ahead of `op`, to reject things like
/// division by zero before they're silently folded into a stream.
fn streamable_binop(vm: &mut Vm, word: &str, op: fn(f64, f64) -> f64, guard: impl Fn(f64, f64) -> Result<()>) -> Result<()> {
    let b = vm.pop(word)?;
    let a = vm.pop(word)?;
    match (a, b) {
        (Value::Num(a), Value::Num(b)) => {
            guard(a, b)?;
            vm.push(Value::Num(op(a, b)));
            Ok(())
        }
        (a, b) => {
            let (a_ty, b_ty) = (a.type_name(), b.type_name());
            let sa = a.into_stream().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number or stream, got {a_ty}")))?;
            let sb = b.into_stream().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number or stream, got {b_ty}")))?;
            vm.push(Value::Stream(sa.combine(sb, move |x, y| x.iter().zip(y.iter()).map(|(p, q)| op(*p, *q)).collect())));
            Ok(())
        }
    }
}

fn no_guard(_a: f64, _b: f64) -> Result<()> {
    Ok(())
}

fn add(vm: &mut Vm) -> Result<()> {
    streamable_binop(vm, "+", |a, b| a + b, no_guard)
}

fn sub(vm: &mut Vm) -> Result<()> {
    streamable_binop(vm, "-", |a, b| a - b, no_guard)
}

fn mul(vm: &mut Vm) -> Result<()> {
    streamable_binop(vm, "*", |a, b| a * b, no_guard)
}

fn div(vm: &mut Vm) -> Result<()> {
    streamable_binop(vm, "/", |a, b| a / b, |_a, b| {
        if b == 0.0 {
            Err(Error::domain("division by zero"))
        } else {
            Ok(())
        }
    })
}

fn rem(vm: &mut Vm) -> Result<()> {
    streamable_binop(vm, "mod", |a, b| a.rem_euclid(b), |_a, b| {
        if b == 0.0 {
            Err(Error::domain("modulo by zero"))
        } else {
            Ok(())
        }
    })
}

fn neg(vm: &mut Vm) -> Result<()> {
    let a = pop_num(vm, "neg")?;
    vm.push(Value::Num(-a));
    Ok(())
}

fn abs(vm: &mut Vm) -> Result<()> {
    let a = pop_num(vm, "abs")?;
    vm.push(Value::Num(a.abs()));
    Ok(())
}

fn floor(vm: &mut Vm) -> Result<()> {
    let a = pop_num(vm, "floor")?;
    vm.push(Value::Num(a.floor()));
    Ok(())
}

fn ceil(vm: &mut Vm) -> Result<()> {
    let a = pop_num(vm, "ceil")?;
    vm.push(Value::Num(a.ceil()));
    Ok(())
}

fn round(vm: &mut Vm) -> Result<()> {
    let a = pop_num(vm, "round")?;
    vm.push(Value::Num(a.round()));
    Ok(())
}

fn sqrt(vm: &mut Vm) -> Result<()> {
    let a = pop_num(vm, "sqrt")?;
    if a < 0.0 {
        return Err(Error::domain("sqrt of a negative number"));
    }
    vm.push(Value::Num(a.sqrt()));
    Ok(())
}

fn pow(vm: &mut Vm) -> Result<()> {
    let b = pop_num(vm, "pow")?;
    let a = pop_num(vm, "pow")?;
    vm.push(Value::Num(a.powf(b)));
    Ok(())
}

/// `rem` is truncating (sign follows the dividend); `mod` above is
/// floored (sign follows the divisor) — spec §4.9 lists both.
fn rem_trunc(vm: &mut Vm) -> Result<()> {
    let b = pop_num(vm, "rem")?;
    let a = pop_num(vm, "rem")?;
    if b == 0.0 {
        return Err(Error::domain("remainder by zero"));
    }
    vm.push(Value::Num(a % b));
    Ok(())
}

macro_rules! unop {
    ($name:ident, $word:expr, $op:expr) => {
        fn $name(vm: &mut Vm) -> Result<()> {
            let a = pop_num(vm, $word)?;
            vm.push(Value::Num($op(a)));
            Ok(())
        }
    };
}

unop!(sign, "sign", f64::signum);
unop!(square, "square", |a: f64| a * a);
unop!(exp_w, "exp", f64::exp);
unop!(exp2_w, "exp2", f64::exp2);
unop!(log10_w, "log10", f64::log10);
unop!(log2_w, "log2", f64::log2);
unop!(trunc, "trunc", f64::trunc);
unop!(sin_w, "sin", f64::sin);
unop!(cos_w, "cos", f64::cos);
unop!(tan_w, "tan", f64::tan);
unop!(asin_w, "asin", f64::asin);
unop!(acos_w, "acos", f64::acos);
unop!(atan_w, "atan", f64::atan);
unop!(sinh_w, "sinh", f64::sinh);
unop!(cosh_w, "cosh", f64::cosh);
unop!(tanh_w, "tanh", f64::tanh);
unop!(asinh_w, "asinh", f64::asinh);
unop!(acosh_w, "acosh", f64::acosh);
unop!(atanh_w, "atanh", f64::atanh);

binop!(atan2_w, "atan2", f64::atan2);
binop!(hypot_w, "hypot", f64::hypot);

fn clamp(vm: &mut Vm) -> Result<()> {
    let hi = pop_num(vm, "clamp")?;
    let lo = pop_num(vm, "clamp")?;
    let x = pop_num(vm, "clamp")?;
    vm.push(Value::Num(x.clamp(lo, hi)));
    Ok(())
}

/// Uniform sample in `[0, 1)` from the VM's shared PRNG (spec §4.9).
fn rand(vm: &mut Vm) -> Result<()> {
    let n = vm.rng.next_u32();
    vm.push(Value::Num(n as f64 / (u32::MAX as f64 + 1.0)));
    Ok(())
}

fn rand_seed(vm: &mut Vm) -> Result<()> {
    let seed = pop_num(vm, "rand/seed")? as u32;
    vm.rng = mixtape_core::noise::Xorshift32::new(seed);
    Ok(())
}

fn nil_q(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("nil?")?;
    vm.push(Value::bool(v.is_nil()));
    Ok(())
}

fn false_q(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("false?")?;
    vm.push(Value::bool(!v.truthy()));
    Ok(())
}

fn true_q(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("true?")?;
    vm.push(Value::bool(v.truthy()));
    Ok(())
}

fn true_word(vm: &mut Vm) -> Result<()> {
    vm.push(Value::TRUE);
    Ok(())
}

fn false_word(vm: &mut Vm) -> Result<()> {
    vm.push(Value::bool(false));
    Ok(())
}

macro_rules! cmp {
    ($name:ident, $word:expr, $op:tt) => {
        fn $name(vm: &mut Vm) -> Result<()> {
            let b = pop_num(vm, $word)?;
            let a = pop_num(vm, $word)?;
            vm.push(Value::bool(a $op b));
            Ok(())
        }
    };
}

cmp!(lt, "<", <);
cmp!(gt, ">", >);
cmp!(lte, "<=", <=);
cmp!(gte, ">=", >=);

fn eq(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("=")?;
    let a = vm.pop("=")?;
    vm.push(Value::bool(a == b));
    Ok(())
}

fn neq(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("!=")?;
    let a = vm.pop("!=")?;
    vm.push(Value::bool(a != b));
    Ok(())
}

fn and(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("and")?;
    let a = vm.pop("and")?;
    vm.push(Value::bool(a.truthy() && b.truthy()));
    Ok(())
}

fn or(vm: &mut Vm) -> Result<()> {
    let b = vm.pop("or")?;
    let a = vm.pop("or")?;
    vm.push(Value::bool(a.truthy() || b.truthy()));
    Ok(())
}

fn not(vm: &mut Vm) -> Result<()> {
    let a = vm.pop("not")?;
    vm.push(Value::bool(!a.truthy()));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("+", add);
    r.register("-", sub);
    r.register("*", mul);
    r.register("/", div);
    r.register("mod", rem);
    for ty in ["Stream", "Tape"] {
        r.register_for(ty, "+", add);
        r.register_for(ty, "-", sub);
        r.register_for(ty, "*", mul);
        r.register_for(ty, "/", div);
        r.register_for(ty, "mod", rem);
    }
    r.register("min", min);
    r.register("max", max);
    r.register("neg", neg);
    r.register("abs", abs);
    r.register("floor", floor);
    r.register("ceil", ceil);
    r.register("round", round);
    r.register("sqrt", sqrt);
    r.register("pow", pow);
    r.register("<", lt);
    r.register(">", gt);
    r.register("<=", lte);
    r.register(">=", gte);
    r.register("=", eq);
    r.register("!=", neq);
    r.register("and", and);
    r.register("or", or);
    r.register("not", not);
    r.register("rem", rem_trunc);
    r.register("sign", sign);
    r.register("square", square);
    r.register("exp", exp_w);
    r.register("exp2", exp2_w);
    r.register("log10", log10_w);
    r.register("log2", log2_w);
    r.register("trunc", trunc);
    r.register("sin", sin_w);
    r.register("cos", cos_w);
    r.register("tan", tan_w);
    r.register("asin", asin_w);
    r.register("acos", acos_w);
    r.register("atan", atan_w);
    r.register("sinh", sinh_w);
    r.register("cosh", cosh_w);
    r.register("tanh", tanh_w);
    r.register("asinh", asinh_w);
    r.register("acosh", acosh_w);
    r.register("atanh", atanh_w);
    r.register("atan2", atan2_w);
    r.register("hypot", hypot_w);
    r.register("clamp", clamp);
    r.register("rand", rand);
    r.register("rand/seed", rand_seed);
    r.register("nil?", nil_q);
    r.register("false?", false_q);
    r.register("true?", true_q);
    r.register("true", true_word);
    r.register("false", false_word);
    r.register("not=", neq);
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
    fn add_pops_two_and_pushes_sum() {
        let mut m = vm();
        m.push(Value::Num(1.0));
        m.push(Value::Num(2.0));
        add(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(3.0)]);
    }

    #[test]
    fn division_by_zero_is_a_domain_error() {
        let mut m = vm();
        m.push(Value::Num(1.0));
        m.push(Value::Num(0.0));
        assert!(matches!(div(&mut m), Err(Error::DomainError { .. })));
    }

    #[test]
    fn comparisons_produce_forth_style_booleans() {
        let mut m = vm();
        m.push(Value::Num(1.0));
        m.push(Value::Num(2.0));
        lt(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::TRUE]);
    }

    #[test]
    fn clamp_bounds_into_the_given_range() {
        let mut m = vm();
        m.push(Value::Num(5.0));
        m.push(Value::Num(0.0));
        m.push(Value::Num(1.0));
        clamp(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(1.0)]);
    }

    #[test]
    fn rand_stays_in_zero_one_and_reseeds_deterministically() {
        let mut m = vm();
        rand(&mut m).unwrap();
        let first = m.pop("t").unwrap().as_num().unwrap();
        assert!((0.0..1.0).contains(&first));

        m.push(Value::Num(7.0));
        rand_seed(&mut m).unwrap();
        rand(&mut m).unwrap();
        let a = m.pop("t").unwrap();

        m.push(Value::Num(7.0));
        rand_seed(&mut m).unwrap();
        rand(&mut m).unwrap();
        let b = m.pop("t").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nil_predicate_distinguishes_nil_from_other_values() {
        let mut m = vm();
        m.push(Value::Nil);
        nil_q(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::TRUE]);
    }

    #[test]
    fn mul_of_two_streams_combines_elementwise() {
        let mut m = vm();
        m.push(Value::Stream(mixtape_core::Stream::constant(2.0)));
        m.push(Value::Stream(mixtape_core::Stream::constant(3.0)));
        mul(&mut m).unwrap();
        let s = m.pop("t").unwrap().as_stream().cloned().unwrap();
        let tape = s.take_into_tape(48000, 4, &mixtape_core::cancel::CancelToken::new(), None).unwrap();
        assert_eq!(tape.samples().to_vec(), vec![6.0, 6.0, 6.0, 6.0]);
    }

    #[test]
    fn add_of_a_stream_and_a_bare_num_widens_the_num_to_a_constant_stream() {
        let mut m = vm();
        m.push(Value::Stream(mixtape_core::Stream::constant(1.0)));
        m.push(Value::Num(2.0));
        add(&mut m).unwrap();
        let s = m.pop("t").unwrap().as_stream().cloned().unwrap();
        let tape = s.take_into_tape(48000, 2, &mixtape_core::cancel::CancelToken::new(), None).unwrap();
        assert_eq!(tape.samples().to_vec(), vec![3.0, 3.0]);
    }
}
