//! Envelope words (spec §4.6).
//!
//! `envelope` (a lower-level primitive not named directly by the spec)
//! renders a sequence of segment descriptions directly into a flat mono
//! tape via `mixtape_core::envelope::build`. A segment is a 3- or
//! 4-element vector: `[duration-frames target shape]`, where `shape` is
//! one of the symbols `line`, `exp`, `log`, `cos`, `sigmoid`, or the
//! two-element vector `[pow k]` for `Shape::Pow(k)`.
//!
//! The six `/name` words are the spec's primitive segment-tape
//! generators: each reads `:start`, `:end`, `:nf` from the env (plus a
//! shape parameter off the stack where the shape needs one) and renders
//! one segment. `env` composes a run of them into a joined envelope by
//! setting `:start`/`:end`/`:nf` per step and running a segment-builder
//! closure; `adsr`/`perc` are convenience constructors built on `env`.

use mixtape_core::envelope::{build, Segment, Shape};
use mixtape_core::{Error, Result, Tape, Value};

use crate::dispatch::Registry;
use crate::env::EnvFrame;
use crate::vm::Vm;

fn parse_shape(v: &Value) -> Result<Shape> {
    if let Some(name) = v.as_str() {
        return match name {
            "line" => Ok(Shape::Line),
            "cos" => Ok(Shape::Cos),
            "exp" => Ok(Shape::Exp(0.0)),
            "log" => Ok(Shape::Log(0.0)),
            "sigmoid" => Ok(Shape::Sigmoid(0.0)),
            other => Err(Error::domain(format!("envelope: unknown shape `{other}`"))),
        };
    }
    let items = v.as_vec().ok_or_else(|| Error::type_mismatch("envelope: expected a shape symbol or [tag k]"))?;
    if items.len() != 2 {
        return Err(Error::domain("envelope: malformed shape"));
    }
    let tag = items[0].as_str().ok_or_else(|| Error::type_mismatch("envelope: expected a shape tag"))?;
    let k = items[1].as_num().ok_or_else(|| Error::type_mismatch(format!("envelope: {tag} shape needs a number")))?;
    match tag {
        "pow" => Ok(Shape::Pow(k)),
        "exp" => Ok(Shape::Exp(k)),
        "log" => Ok(Shape::Log(k)),
        "sigmoid" => Ok(Shape::Sigmoid(k)),
        other => Err(Error::domain(format!("envelope: unknown shape `{other}`"))),
    }
}

fn parse_segment(v: &Value) -> Result<Segment> {
    let items = v.as_vec().ok_or_else(|| Error::type_mismatch("envelope: expected a segment vector"))?;
    if items.len() < 3 {
        return Err(Error::domain("envelope: segment needs duration, target, shape"));
    }
    let duration_frames = items[0].as_num().ok_or_else(|| Error::type_mismatch("envelope: duration must be a number"))? as usize;
    let target = items[1].as_num().ok_or_else(|| Error::type_mismatch("envelope: target must be a number"))?;
    let shape = parse_shape(&items[2])?;
    Ok(Segment { duration_frames, target, shape })
}

fn envelope(vm: &mut Vm) -> Result<()> {
    let segments_v = vm.pop("envelope")?;
    let start = vm.pop("envelope")?.as_num().ok_or_else(|| Error::type_mismatch("envelope: expected a start value"))?;
    let items = segments_v.as_vec().ok_or_else(|| Error::type_mismatch("envelope: expected a vector of segments"))?;
    let segments: Vec<Segment> = items.iter().map(parse_segment).collect::<Result<_>>()?;
    let tape = build(vm.transport.sample_rate, start, &segments);
    vm.push(Value::Tape(tape));
    Ok(())
}

fn env_triplet(vm: &Vm, word: &str) -> Result<(f64, f64, usize)> {
    let start = vm.env.fetch(":start").and_then(Value::as_num).ok_or_else(|| Error::domain(format!("{word}: `:start` is not bound")))?;
    let end = vm.env.fetch(":end").and_then(Value::as_num).ok_or_else(|| Error::domain(format!("{word}: `:end` is not bound")))?;
    let nf = vm.env.fetch(":nf").and_then(Value::as_num).ok_or_else(|| Error::domain(format!("{word}: `:nf` is not bound")))? as usize;
    Ok((start, end, nf))
}

fn segment_tape(vm: &mut Vm, word: &str, shape: Shape) -> Result<()> {
    let (start, end, nf) = env_triplet(vm, word)?;
    let tape = build(vm.transport.sample_rate, start, &[Segment { duration_frames: nf, target: end, shape }]);
    vm.push(Value::Tape(tape));
    Ok(())
}

fn line(vm: &mut Vm) -> Result<()> {
    segment_tape(vm, "/line", Shape::Line)
}

fn exp_seg(vm: &mut Vm) -> Result<()> {
    let k = vm.pop("/exp")?.as_num().ok_or_else(|| Error::type_mismatch("/exp: expected a shape parameter"))?;
    segment_tape(vm, "/exp", Shape::Exp(k))
}

fn log_seg(vm: &mut Vm) -> Result<()> {
    let k = vm.pop("/log")?.as_num().ok_or_else(|| Error::type_mismatch("/log: expected a shape parameter"))?;
    segment_tape(vm, "/log", Shape::Log(k))
}

fn cos_seg(vm: &mut Vm) -> Result<()> {
    segment_tape(vm, "/cos", Shape::Cos)
}

fn pow_seg(vm: &mut Vm) -> Result<()> {
    let p = vm.pop("/pow")?.as_num().ok_or_else(|| Error::type_mismatch("/pow: expected an exponent"))?;
    segment_tape(vm, "/pow", Shape::Pow(p))
}

fn sigmoid_seg(vm: &mut Vm) -> Result<()> {
    let k = vm.pop("/sigmoid")?.as_num().ok_or_else(|| Error::type_mismatch("/sigmoid: expected a shape parameter"))?;
    segment_tape(vm, "/sigmoid", Shape::Sigmoid(k))
}

fn popped_nums(v: &Value, word: &str) -> Result<Vec<f64>> {
    let items = v.as_vec().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a vector")))?;
    items.iter().map(|n| n.as_num().ok_or_else(|| Error::type_mismatch(format!("{word}: expected numbers")))).collect()
}

fn popped_quotations(v: &Value, word: &str) -> Result<Vec<Vec<Value>>> {
    let items = v.as_vec().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a vector")))?;
    items
        .iter()
        .map(|q| q.as_vec().map(|rc| rc.as_ref().clone()).ok_or_else(|| Error::type_mismatch(format!("{word}: expected quotations"))))
        .collect()
}

/// `env (values durations segment-builders -- Tape)`: composes `n-1`
/// segments (where `n = values.len()`) into one joined tape, binding
/// `:start`/`:end`/`:nf` per step in a fresh env frame before evaluating
/// the step's builder closure.
fn env_word(vm: &mut Vm) -> Result<()> {
    let segs_v = vm.pop("env")?;
    let durs_v = vm.pop("env")?;
    let values_v = vm.pop("env")?;
    let segs = popped_quotations(&segs_v, "env")?;
    let durs = popped_nums(&durs_v, "env")?;
    let values = popped_nums(&values_v, "env")?;
    if values.len() < 2 || durs.len() != values.len() - 1 || segs.len() != durs.len() {
        return Err(Error::domain("env: values/durations/segment-builders lengths don't line up"));
    }

    let sr = vm.transport.sample_rate;
    let mut out = Tape::silence(sr, 1, 0);
    let mut offset = 0usize;
    for i in 0..durs.len() {
        vm.env.push(EnvFrame::new());
        vm.env.bind(":start".into(), Value::Num(values[i]));
        vm.env.bind(":end".into(), Value::Num(values[i + 1]));
        vm.env.bind(":nf".into(), Value::Num(durs[i]));
        let result = vm.eval(&segs[i]);
        vm.env.pop();
        result?;
        let seg_tape = vm.pop("env")?.as_tape().cloned().ok_or_else(|| Error::type_mismatch("env: segment builder must leave a tape"))?;
        out.add_at(&seg_tape, offset)?;
        offset += seg_tape.nframes();
    }
    vm.push(Value::Tape(out));
    Ok(())
}

/// `adsr (a d s r dur -- Tape)`: attack/decay to sustain/release, all in
/// seconds, as linear segments.
fn adsr(vm: &mut Vm) -> Result<()> {
    let dur = vm.pop("adsr")?.as_num().ok_or_else(|| Error::type_mismatch("adsr: expected a duration"))?;
    let r = vm.pop("adsr")?.as_num().ok_or_else(|| Error::type_mismatch("adsr: expected release"))?;
    let s = vm.pop("adsr")?.as_num().ok_or_else(|| Error::type_mismatch("adsr: expected sustain"))?;
    let d = vm.pop("adsr")?.as_num().ok_or_else(|| Error::type_mismatch("adsr: expected decay"))?;
    let a = vm.pop("adsr")?.as_num().ok_or_else(|| Error::type_mismatch("adsr: expected attack"))?;
    let sr = vm.transport.sample_rate as f64;
    let sustain_frames = (dur - a - d - r).max(0.0);
    let frames = |seconds: f64| (seconds * sr).floor();
    let sr_u32 = vm.transport.sample_rate;
    let mut out = Tape::silence(sr_u32, 1, 0);
    let mut offset = 0usize;
    for (start, end, seconds) in [(0.0, 1.0, a), (1.0, s, d), (s, s, sustain_frames / sr), (s, 0.0, r)] {
        let nf = frames(seconds) as usize;
        let seg = build(sr_u32, start, &[Segment { duration_frames: nf, target: end, shape: Shape::Line }]);
        out.add_at(&seg, offset)?;
        offset += seg.nframes();
    }
    vm.push(Value::Tape(out));
    Ok(())
}

/// `perc (a r -- Tape)`: a percussive attack-release envelope, peaking
/// at `1.0`.
fn perc(vm: &mut Vm) -> Result<()> {
    let r = vm.pop("perc")?.as_num().ok_or_else(|| Error::type_mismatch("perc: expected a release"))?;
    let a = vm.pop("perc")?.as_num().ok_or_else(|| Error::type_mismatch("perc: expected an attack"))?;
    let sr = vm.transport.sample_rate;
    let mut out = Tape::silence(sr, 1, 0);
    let attack = build(sr, 0.0, &[Segment { duration_frames: (a * sr as f64).floor() as usize, target: 1.0, shape: Shape::Line }]);
    let offset = attack.nframes();
    out.add_at(&attack, 0)?;
    let release = build(sr, 1.0, &[Segment { duration_frames: (r * sr as f64).floor() as usize, target: 0.0, shape: Shape::Exp(4.0) }]);
    out.add_at(&release, offset)?;
    vm.push(Value::Tape(out));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("envelope", envelope);
    r.register("/line", line);
    r.register("/exp", exp_seg);
    r.register("/log", log_seg);
    r.register("/cos", cos_seg);
    r.register("/pow", pow_seg);
    r.register("/sigmoid", sigmoid_seg);
    r.register("env", env_word);
    r.register("adsr", adsr);
    r.register("perc", perc);
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
    fn builds_a_single_line_segment() {
        let mut m = vm();
        m.push(Value::Num(0.0));
        m.push(Value::vec(vec![Value::vec(vec![
            Value::Num(100.0),
            Value::Num(1.0),
            Value::sym("line"),
        ])]));
        envelope(&mut m).unwrap();
        let t = m.stack[0].as_tape().unwrap();
        assert_eq!(t.nframes(), 100);
        let last = t.at(99).unwrap();
        assert!((last[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn line_segment_word_reads_the_env_triplet() {
        let mut reg = Registry::new();
        crate::words::register_all(&mut reg);
        let mut m = Vm::new(Rc::new(reg), Transport::new(48000, 120.0, 960), std::env::temp_dir());
        let prog = crate::parser::parse("t", "( 0 >:start 1 >:end 4 >:nf /line )").unwrap();
        m.eval(&prog).unwrap();
        let t = m.stack[0].as_tape().unwrap();
        assert_eq!(t.samples().to_vec(), vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn pow_shape_is_accepted() {
        let mut m = vm();
        m.push(Value::Num(0.0));
        m.push(Value::vec(vec![Value::vec(vec![
            Value::Num(10.0),
            Value::Num(1.0),
            Value::vec(vec![Value::str("pow"), Value::Num(2.0)]),
        ])]));
        envelope(&mut m).unwrap();
        let t = m.stack[0].as_tape().unwrap();
        assert_eq!(t.nframes(), 10);
    }
}
