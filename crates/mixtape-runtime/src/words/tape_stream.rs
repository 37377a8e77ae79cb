//! `Tape` and `Stream` words (spec §4.3, §4.4): the non-DSP-specific parts
//! of C8 — slicing, mutation, coercion between the two, and `take`, which
//! is the primary way programs materialize a stream into a tape and the
//! one place cancellation is checked (spec §5).

use mixtape_core::{resample::Converter, Error, Result, Value};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn as_tape(v: &Value, word: &str) -> Result<mixtape_core::Tape> {
    v.as_tape().cloned().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a tape")))
}

fn as_stream(v: &Value, word: &str) -> Result<mixtape_core::Stream> {
    v.as_stream().cloned().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a stream")))
}

fn num(v: &Value, word: &str) -> Result<f64> {
    v.as_num().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number")))
}

fn nchannels(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("nchannels")?;
    let n = match &v {
        Value::Tape(t) => t.nchannels() as f64,
        Value::Stream(s) => s.nchannels() as f64,
        _ => return Err(Error::type_mismatch("nchannels: expected a tape or stream")),
    };
    vm.push(Value::Num(n));
    Ok(())
}

fn nframes(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("nframes")?;
    let t = as_tape(&v, "nframes")?;
    vm.push(Value::Num(t.nframes() as f64));
    Ok(())
}

fn sample_rate(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("sample-rate")?;
    let t = as_tape(&v, "sample-rate")?;
    vm.push(Value::Num(t.sample_rate() as f64));
    Ok(())
}

/// `at (receiver idx -- item)`: indexes a `Vec` by element, or a `Tape`
/// by frame (returning that frame's per-channel samples as a `Vec`).
/// The index sits on top regardless of receiver type, so this can't be
/// resolved by the top-of-stack-type dispatch alone and instead checks
/// the receiver itself (spec §4.9's `at` is one word across both types).
fn tape_at(vm: &mut Vm) -> Result<()> {
    let idx = num(&vm.pop("at")?, "at")? as usize;
    let receiver = vm.pop("at")?;
    match &receiver {
        Value::Vec(items) => {
            let item = items.get(idx).cloned().ok_or_else(|| Error::domain(format!("at: index {idx} out of range")))?;
            vm.push(item);
        }
        Value::Tape(t) => {
            let samples = t.at(idx)?;
            vm.push(Value::vec(samples.into_iter().map(Value::Num).collect()));
        }
        other => return Err(Error::type_mismatch(format!("at: expected a vector or tape, got {}", other.type_name()))),
    }
    Ok(())
}

fn tape_slice(vm: &mut Vm) -> Result<()> {
    let end = num(&vm.pop("slice")?, "slice")? as usize;
    let start = num(&vm.pop("slice")?, "slice")? as usize;
    let t = as_tape(&vm.pop("slice")?, "slice")?;
    vm.push(Value::Tape(t.slice(start, end)?));
    Ok(())
}

fn tape_shift(vm: &mut Vm) -> Result<()> {
    let amount = num(&vm.pop("shift")?, "shift")?;
    let mut t = as_tape(&vm.pop("shift")?, "shift")?;
    t.shift(amount);
    vm.push(Value::Tape(t));
    Ok(())
}

fn tape_add_at(vm: &mut Vm) -> Result<()> {
    let offset = num(&vm.pop("+@")?, "+@")? as usize;
    let other = as_tape(&vm.pop("+@")?, "+@")?;
    let mut base = as_tape(&vm.pop("+@")?, "+@")?;
    base.add_at(&other, offset)?;
    vm.push(Value::Tape(base));
    Ok(())
}

fn tape_remove_dc(vm: &mut Vm) -> Result<()> {
    let mut t = as_tape(&vm.pop("remove-dc")?, "remove-dc")?;
    t.remove_dc_in_place();
    vm.push(Value::Tape(t));
    Ok(())
}

fn parse_converter(name: &str) -> Result<Converter> {
    match name {
        "sinc-best" => Ok(Converter::SincBest),
        "sinc-medium" => Ok(Converter::SincMedium),
        "sinc-fastest" => Ok(Converter::SincFastest),
        "zoh" => Ok(Converter::Zoh),
        "linear" => Ok(Converter::Linear),
        other => Err(Error::domain(format!("resample: unknown converter `{other}`"))),
    }
}

fn tape_resample(vm: &mut Vm) -> Result<()> {
    let ratio = num(&vm.pop("resample")?, "resample")?;
    let converter_v = vm.pop("resample")?;
    let converter_name = converter_v.as_str().ok_or_else(|| Error::type_mismatch("resample: expected a converter symbol"))?;
    let converter = parse_converter(converter_name)?;
    let t = as_tape(&vm.pop("resample")?, "resample")?;
    vm.push(Value::Tape(t.resample(converter, ratio)?));
    Ok(())
}

fn at_phase(vm: &mut Vm) -> Result<()> {
    let phase = as_stream(&vm.pop("at/phase")?, "at/phase")?;
    let t = as_tape(&vm.pop("at/phase")?, "at/phase")?;
    vm.push(Value::Stream(t.at_phase(phase)));
    Ok(())
}

fn to_stream(vm: &mut Vm) -> Result<()> {
    let v = vm.pop("stream")?;
    let s = v.into_stream().ok_or_else(|| Error::type_mismatch("stream: value is not streamable"))?;
    vm.push(Value::Stream(s));
    Ok(())
}

fn mono(vm: &mut Vm) -> Result<()> {
    let s = as_stream(&vm.pop("mono")?, "mono")?;
    vm.push(Value::Stream(s.mono()));
    Ok(())
}

fn stereo(vm: &mut Vm) -> Result<()> {
    let s = as_stream(&vm.pop("stereo")?, "stereo")?;
    vm.push(Value::Stream(s.stereo()));
    Ok(())
}

fn delay(vm: &mut Vm) -> Result<()> {
    let n = num(&vm.pop("delay")?, "delay")? as usize;
    let s = as_stream(&vm.pop("delay")?, "delay")?;
    vm.push(Value::Stream(s.delay(n)));
    Ok(())
}

fn skip(vm: &mut Vm) -> Result<()> {
    let n = num(&vm.pop("skip")?, "skip")? as usize;
    let s = as_stream(&vm.pop("skip")?, "skip")?;
    vm.push(Value::Stream(s.skip(n)));
    Ok(())
}

/// Materializes `s` into a `Tape` of at most `n` frames (spec §4.4:
/// `take` is the primary way programs turn a stream into audio).
fn take(vm: &mut Vm) -> Result<()> {
    let n = num(&vm.pop("take")?, "take")? as usize;
    let s = as_stream(&vm.pop("take")?, "take")?;
    let tape = s.take_into_tape(vm.transport.sample_rate, n, &vm.cancel, None)?;
    vm.push(Value::Tape(tape));
    Ok(())
}

fn join(vm: &mut Vm) -> Result<()> {
    let b = as_stream(&vm.pop("join")?, "join")?;
    let a = as_stream(&vm.pop("join")?, "join")?;
    vm.push(Value::Stream(a.join(b)?));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("nchannels", nchannels);
    r.register("nframes", nframes);
    r.register("sample-rate", sample_rate);
    r.register("at", tape_at);
    r.register("slice", tape_slice);
    r.register("shift", tape_shift);
    r.register("+@", tape_add_at);
    r.register("remove-dc", tape_remove_dc);
    r.register("resample", tape_resample);
    r.register("at/phase", at_phase);
    r.register("stream", to_stream);
    r.register("mono", mono);
    r.register("stereo", stereo);
    r.register("delay", delay);
    r.register("skip", skip);
    r.register("take", take);
    r.register("join", join);
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
    fn take_materializes_a_tape_bounded_by_n() {
        let mut m = vm();
        m.push(Value::Stream(mixtape_core::Stream::constant(1.0)));
        m.push(Value::Num(10.0));
        take(&mut m).unwrap();
        let t = as_tape(&m.stack[0], "test").unwrap();
        assert_eq!(t.nframes(), 10);
    }

    #[test]
    fn slice_then_nframes_matches_requested_range() {
        let mut m = vm();
        let t = mixtape_core::Tape::silence(48000, 1, 100);
        m.push(Value::Tape(t));
        m.push(Value::Num(10.0));
        m.push(Value::Num(20.0));
        tape_slice(&mut m).unwrap();
        nframes(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(10.0)]);
    }
}
