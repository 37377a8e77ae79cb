//! Oscillator, filter, and noise words (spec §4.8) — thin wiring from the
//! DSL onto `mixtape_core`'s pure signal-processing functions.

use std::rc::Rc;

use mixtape_core::{noise, oscillator, Error, Result, Stream, Tape, Value, Wavetable};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn as_stream(v: &Value, word: &str) -> Result<mixtape_core::Stream> {
    v.as_stream().cloned().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a stream")))
}

fn num(v: &Value, word: &str) -> Result<f64> {
    v.as_num().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number")))
}

/// Number of frames in the one-cycle tapes `~sin`/`~saw`/`~triangle`/
/// `~square`/`~pulse`/`~tanh` build for `at/phase` playback.
const CYCLE_LEN: usize = 2048;

fn env_num(vm: &Vm, key: &str, default: f64) -> f64 {
    vm.env.fetch(key).and_then(Value::as_num).unwrap_or(default)
}

/// Reads an env slot expected to be `Streamable` (a `Num` or a `Stream`),
/// defaulting to a constant stream of `default` when unbound.
fn env_streamable(vm: &Vm, key: &str, default: f64) -> Stream {
    match vm.env.fetch(key) {
        Some(Value::Stream(s)) => s.clone(),
        Some(v) => Stream::constant(v.as_num().unwrap_or(default)),
        None => Stream::constant(default),
    }
}

fn cycle_tape(sample_rate: u32, f: impl Fn(f64) -> f64) -> Tape {
    let samples: Vec<f64> = (0..CYCLE_LEN).map(|i| f(i as f64 / CYCLE_LEN as f64)).collect();
    Tape::mono(sample_rate, samples)
}

fn tilde_phasor(vm: &mut Vm) -> Result<()> {
    let freq = env_streamable(vm, ":freq", 440.0);
    let phase0 = env_num(vm, ":phase", 0.0);
    vm.push(Value::Stream(oscillator::phasor_from(freq, vm.transport.sample_rate, phase0)));
    Ok(())
}

fn tilde_impulse(vm: &mut Vm) -> Result<()> {
    let freq = env_streamable(vm, ":freq", 440.0);
    let phase0 = env_num(vm, ":phase", 0.0);
    vm.push(Value::Stream(oscillator::impulse_from(freq, vm.transport.sample_rate, phase0)));
    Ok(())
}

fn waveform_stream(vm: &mut Vm, tape: Tape) -> Result<()> {
    let freq = env_streamable(vm, ":freq", 440.0);
    let phase0 = env_num(vm, ":phase", 0.0);
    let phase = oscillator::phasor_from(freq, vm.transport.sample_rate, phase0);
    vm.push(Value::Stream(tape.at_phase(phase)));
    Ok(())
}

fn tilde_sin(vm: &mut Vm) -> Result<()> {
    let sr = vm.transport.sample_rate;
    waveform_stream(vm, cycle_tape(sr, |t| (t * std::f64::consts::TAU).sin()))
}

fn tilde_saw(vm: &mut Vm) -> Result<()> {
    let sr = vm.transport.sample_rate;
    waveform_stream(vm, cycle_tape(sr, |t| 2.0 * t - 1.0))
}

fn tilde_triangle(vm: &mut Vm) -> Result<()> {
    let sr = vm.transport.sample_rate;
    waveform_stream(vm, cycle_tape(sr, |t| 1.0 - 4.0 * (t - 0.5).abs()))
}

fn tilde_square(vm: &mut Vm) -> Result<()> {
    let sr = vm.transport.sample_rate;
    waveform_stream(vm, cycle_tape(sr, |t| if t < 0.5 { 1.0 } else { -1.0 }))
}

fn tilde_pulse(vm: &mut Vm) -> Result<()> {
    let pw = env_num(vm, ":pw", 0.5).clamp(0.0, 1.0);
    let sr = vm.transport.sample_rate;
    waveform_stream(vm, cycle_tape(sr, |t| if t < pw { 1.0 } else { -1.0 }))
}

fn tilde_tanh(vm: &mut Vm) -> Result<()> {
    let sr = vm.transport.sample_rate;
    waveform_stream(vm, cycle_tape(sr, |t| (t * std::f64::consts::TAU).sin().tanh()))
}

fn tilde_wt(vm: &mut Vm) -> Result<()> {
    let wt = match vm.env.fetch(":wt") {
        Some(Value::Wavetable(w)) => w.clone(),
        _ => return Err(Error::domain("~wt: `:wt` is not bound to a wavetable")),
    };
    let freq = env_streamable(vm, ":freq", 440.0);
    let phase0 = env_num(vm, ":phase", 0.0);
    vm.push(Value::Stream(oscillator::wavetable_osc_from(wt, freq, vm.transport.sample_rate, phase0)));
    Ok(())
}

fn tilde_fm(vm: &mut Vm) -> Result<()> {
    let wt = match vm.env.fetch(":wt") {
        Some(Value::Wavetable(w)) => w.clone(),
        _ => return Err(Error::domain("~fm: `:wt` is not bound to a wavetable")),
    };
    let carrier = env_streamable(vm, ":freq", 440.0);
    let modulator = env_streamable(vm, ":mod", 0.0);
    let index = env_num(vm, ":index", 1.0);
    let phase0 = env_num(vm, ":phase", 0.0);
    vm.push(Value::Stream(oscillator::fm_osc_from(wt, carrier, modulator, index, vm.transport.sample_rate, phase0)));
    Ok(())
}

fn tilde_noise(vm: &mut Vm) -> Result<()> {
    let seed = env_num(vm, ":seed", 0.0) as u32;
    vm.push(Value::Stream(noise::white(seed)));
    Ok(())
}

fn tilde_pink(vm: &mut Vm) -> Result<()> {
    let seed = env_num(vm, ":seed", 0.0) as u32;
    vm.push(Value::Stream(noise::pink(seed)));
    Ok(())
}

fn tilde_brown(vm: &mut Vm) -> Result<()> {
    let seed = env_num(vm, ":seed", 0.0) as u32;
    let step = num(&vm.pop("~brown")?, "~brown")?;
    vm.push(Value::Stream(noise::brown_with_step(seed, step)));
    Ok(())
}

fn phasor(vm: &mut Vm) -> Result<()> {
    let freq = as_stream(&vm.pop("phasor")?, "phasor")?;
    vm.push(Value::Stream(oscillator::phasor(freq, vm.transport.sample_rate)));
    Ok(())
}

fn impulse(vm: &mut Vm) -> Result<()> {
    let freq = as_stream(&vm.pop("impulse")?, "impulse")?;
    vm.push(Value::Stream(oscillator::impulse(freq, vm.transport.sample_rate)));
    Ok(())
}

fn wavetable(vm: &mut Vm) -> Result<()> {
    let t = vm.pop("wavetable")?;
    let tape = t.as_tape().ok_or_else(|| Error::type_mismatch("wavetable: expected a tape cycle"))?;
    let cycle: Vec<f64> = tape.samples().to_vec();
    let wt = Wavetable::from_cycle(vm.transport.sample_rate, &cycle);
    vm.push(Value::Wavetable(Rc::new(wt)));
    Ok(())
}

fn as_wavetable(v: &Value, word: &str) -> Result<Rc<Wavetable>> {
    match v {
        Value::Wavetable(w) => Ok(w.clone()),
        _ => Err(Error::type_mismatch(format!("{word}: expected a wavetable"))),
    }
}

fn wave_osc(vm: &mut Vm) -> Result<()> {
    let freq = as_stream(&vm.pop("wave-osc")?, "wave-osc")?;
    let wt = as_wavetable(&vm.pop("wave-osc")?, "wave-osc")?;
    vm.push(Value::Stream(oscillator::wavetable_osc(wt, freq, vm.transport.sample_rate)));
    Ok(())
}

fn fm_osc(vm: &mut Vm) -> Result<()> {
    let index = num(&vm.pop("fm-osc")?, "fm-osc")?;
    let modulator = as_stream(&vm.pop("fm-osc")?, "fm-osc")?;
    let carrier = as_stream(&vm.pop("fm-osc")?, "fm-osc")?;
    let wt = as_wavetable(&vm.pop("fm-osc")?, "fm-osc")?;
    vm.push(Value::Stream(oscillator::fm_osc(wt, carrier, modulator, index, vm.transport.sample_rate)));
    Ok(())
}

fn white(vm: &mut Vm) -> Result<()> {
    let seed = num(&vm.pop("white")?, "white")? as u32;
    vm.push(Value::Stream(noise::white(seed)));
    Ok(())
}

fn pink(vm: &mut Vm) -> Result<()> {
    let seed = num(&vm.pop("pink")?, "pink")? as u32;
    vm.push(Value::Stream(noise::pink(seed)));
    Ok(())
}

fn brown(vm: &mut Vm) -> Result<()> {
    let seed = num(&vm.pop("brown")?, "brown")? as u32;
    vm.push(Value::Stream(noise::brown(seed)));
    Ok(())
}

fn onepole(vm: &mut Vm) -> Result<()> {
    let coeff = as_stream(&vm.pop("onepole")?, "onepole")?;
    let input = as_stream(&vm.pop("onepole")?, "onepole")?;
    vm.push(Value::Stream(mixtape_core::filter::onepole(input, coeff)));
    Ok(())
}

fn lp1(vm: &mut Vm) -> Result<()> {
    let cutoff = as_stream(&vm.pop("lp1")?, "lp1")?;
    let input = as_stream(&vm.pop("lp1")?, "lp1")?;
    vm.push(Value::Stream(mixtape_core::filter::lp1(input, cutoff, vm.transport.sample_rate)));
    Ok(())
}

fn hp1(vm: &mut Vm) -> Result<()> {
    let cutoff = as_stream(&vm.pop("hp1")?, "hp1")?;
    let input = as_stream(&vm.pop("hp1")?, "hp1")?;
    vm.push(Value::Stream(mixtape_core::filter::hp1(input, cutoff, vm.transport.sample_rate)));
    Ok(())
}

fn ap1(vm: &mut Vm) -> Result<()> {
    let cutoff = as_stream(&vm.pop("ap1")?, "ap1")?;
    let input = as_stream(&vm.pop("ap1")?, "ap1")?;
    vm.push(Value::Stream(mixtape_core::filter::ap1(input, cutoff, vm.transport.sample_rate)));
    Ok(())
}

fn dc_block(vm: &mut Vm) -> Result<()> {
    let input = as_stream(&vm.pop("dc-block")?, "dc-block")?;
    vm.push(Value::Stream(mixtape_core::filter::dc_blocker(input)));
    Ok(())
}

/// `MIXTAPE_SVF_TANH=1` turns on the optional saturating nonlinearity
/// (spec §9, open question (c)).
fn svf_tanh_enabled() -> bool {
    std::env::var("MIXTAPE_SVF_TANH").map(|v| v == "1").unwrap_or(false)
}

fn svf(vm: &mut Vm) -> Result<()> {
    let resonance = as_stream(&vm.pop("svf")?, "svf")?;
    let cutoff = as_stream(&vm.pop("svf")?, "svf")?;
    let input = as_stream(&vm.pop("svf")?, "svf")?;
    vm.push(Value::Stream(mixtape_core::filter::svf(
        input,
        cutoff,
        resonance,
        vm.transport.sample_rate,
        svf_tanh_enabled(),
    )));
    Ok(())
}

fn comb(vm: &mut Vm) -> Result<()> {
    let feedback = num(&vm.pop("comb")?, "comb")?;
    let delay_frames = num(&vm.pop("comb")?, "comb")? as usize;
    let input = as_stream(&vm.pop("comb")?, "comb")?;
    vm.push(Value::Stream(mixtape_core::filter::comb(input, delay_frames, feedback)));
    Ok(())
}

fn softclip(vm: &mut Vm) -> Result<()> {
    let drive = as_stream(&vm.pop("softclip")?, "softclip")?;
    let input = as_stream(&vm.pop("softclip")?, "softclip")?;
    vm.push(Value::Stream(mixtape_core::filter::softclip(input, drive)));
    Ok(())
}

fn sample_hold(vm: &mut Vm) -> Result<()> {
    let trigger = as_stream(&vm.pop("sample-hold")?, "sample-hold")?;
    let input = as_stream(&vm.pop("sample-hold")?, "sample-hold")?;
    vm.push(Value::Stream(mixtape_core::filter::sample_and_hold(input, trigger)));
    Ok(())
}

fn pan(vm: &mut Vm) -> Result<()> {
    let pos = as_stream(&vm.pop("pan")?, "pan")?;
    let input = as_stream(&vm.pop("pan")?, "pan")?;
    vm.push(Value::Stream(mixtape_core::filter::pan(input, pos)));
    Ok(())
}

fn mix(vm: &mut Vm) -> Result<()> {
    let amt = as_stream(&vm.pop("mix")?, "mix")?;
    let b = as_stream(&vm.pop("mix")?, "mix")?;
    let a = as_stream(&vm.pop("mix")?, "mix")?;
    vm.push(Value::Stream(mixtape_core::filter::mix(a, b, amt)));
    Ok(())
}

fn peak(vm: &mut Vm) -> Result<()> {
    let decay = num(&vm.pop("peak")?, "peak")?;
    let input = as_stream(&vm.pop("peak")?, "peak")?;
    vm.push(Value::Stream(mixtape_core::filter::peak(input, decay)));
    Ok(())
}

fn decimate(vm: &mut Vm) -> Result<()> {
    let factor = num(&vm.pop("decimate")?, "decimate")? as usize;
    let input = as_stream(&vm.pop("decimate")?, "decimate")?;
    vm.push(Value::Stream(mixtape_core::filter::decimate(input, factor)));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("phasor", phasor);
    r.register("impulse", impulse);
    r.register("wavetable", wavetable);
    r.register("wave-osc", wave_osc);
    r.register("fm-osc", fm_osc);
    r.register("white", white);
    r.register("pink", pink);
    r.register("brown", brown);
    r.register("onepole", onepole);
    r.register("lp1", lp1);
    r.register("hp1", hp1);
    r.register("ap1", ap1);
    r.register("dc-block", dc_block);
    r.register("svf", svf);
    r.register("comb", comb);
    r.register("softclip", softclip);
    r.register("sample-hold", sample_hold);
    r.register("pan", pan);
    r.register("mix", mix);
    r.register("peak", peak);
    r.register("decimate", decimate);
    r.register("~phasor", tilde_phasor);
    r.register("~impulse", tilde_impulse);
    r.register("~sin", tilde_sin);
    r.register("~saw", tilde_saw);
    r.register("~triangle", tilde_triangle);
    r.register("~square", tilde_square);
    r.register("~pulse", tilde_pulse);
    r.register("~tanh", tilde_tanh);
    r.register("~wt", tilde_wt);
    r.register("~fm", tilde_fm);
    r.register("~noise", tilde_noise);
    r.register("~pink", tilde_pink);
    r.register("~brown", tilde_brown);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_core::time::Transport;

    fn vm() -> Vm {
        Vm::new(Rc::new(Registry::new()), Transport::new(48000, 120.0, 960), std::env::temp_dir())
    }

    #[test]
    fn phasor_word_produces_a_stream() {
        let mut m = vm();
        m.push(Value::Stream(mixtape_core::Stream::constant(440.0)));
        phasor(&mut m).unwrap();
        assert!(matches!(m.stack[0], Value::Stream(_)));
    }

    #[test]
    fn tilde_sin_reads_freq_from_the_env_and_plays_via_at_phase() {
        let mut full = Registry::new();
        crate::words::register_all(&mut full);
        let mut m = Vm::new(Rc::new(full), Transport::new(48000, 120.0, 960), std::env::temp_dir());
        let prog = crate::parser::parse("t", "440 >:freq ~sin 1 take").unwrap();
        m.eval(&prog).unwrap();
        let tape = m.stack[0].as_tape().expect("expected a tape");
        assert_eq!(tape.nframes(), 1);
        assert_eq!(tape.nchannels(), 1);
        assert!(tape.samples()[0].abs() < 1e-6);
    }

    #[test]
    fn wavetable_word_builds_from_a_tape_cycle() {
        let mut m = vm();
        let cycle: Vec<f64> = (0..256).map(|i| (i as f64 / 256.0 * std::f64::consts::TAU).sin()).collect();
        m.push(Value::Tape(mixtape_core::Tape::mono(48000, cycle)));
        wavetable(&mut m).unwrap();
        assert!(matches!(m.stack[0], Value::Wavetable(_)));
    }
}
