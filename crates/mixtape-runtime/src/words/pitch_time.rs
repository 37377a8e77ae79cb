//! Time-suffix and pitch/amplitude helper words (spec §4.7).
//!
//! `seconds`/`beats`/`ticks`/`periods` are what the parser's numeric
//! time-suffix sugar (`1b`, `0.5s`, ...) expands into; they convert a
//! scalar count to an integer frame count against the transport (and,
//! for `periods`, against `:freq`). `mtof`/`st`/`cents`/`db`/`gain` are
//! plain numeric conversions, grounded in `mixtape_core::pitch`.

use mixtape_core::{pitch, Error, Result, Value};

use crate::dispatch::Registry;
use crate::vm::Vm;

fn pop_num(vm: &mut Vm, word: &str) -> Result<f64> {
    vm.pop(word)?.as_num().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number")))
}

fn seconds(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "seconds")?;
    vm.push(Value::Num((n * vm.transport.sample_rate as f64).floor()));
    Ok(())
}

fn beats(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "beats")?;
    let frames = n * vm.transport.sample_rate as f64 * 60.0 / vm.transport.bpm;
    vm.push(Value::Num(frames.floor()));
    Ok(())
}

fn ticks(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "ticks")?;
    vm.push(Value::Num(n / vm.transport.ticks_per_beat as f64));
    beats(vm)
}

fn periods(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "periods")?;
    let freq = vm.env.fetch(":freq").and_then(Value::as_num).unwrap_or(440.0);
    vm.push(Value::Num((n * vm.transport.sample_rate as f64 / freq).floor()));
    Ok(())
}

fn mtof(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "mtof")?;
    vm.push(Value::Num(pitch::note_to_freq(n)));
    Ok(())
}

fn st(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "st")?;
    vm.push(Value::Num(pitch::semitones_to_ratio(n)));
    Ok(())
}

fn cents(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "cents")?;
    vm.push(Value::Num(pitch::cents_to_ratio(n)));
    Ok(())
}

fn db(vm: &mut Vm) -> Result<()> {
    let n = pop_num(vm, "db")?;
    vm.push(Value::Num(10f64.powf(n / 20.0)));
    Ok(())
}

fn gain(vm: &mut Vm) -> Result<()> {
    let db_v = pop_num(vm, "gain")?;
    let s = pop_num(vm, "gain")?;
    vm.push(Value::Num(s * 10f64.powf(db_v / 20.0)));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("seconds", seconds);
    r.register("beats", beats);
    r.register("ticks", ticks);
    r.register("periods", periods);
    r.register("mtof", mtof);
    r.register("st", st);
    r.register("cents", cents);
    r.register("db", db);
    r.register("gain", gain);
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
    fn mtof_of_a4_is_440() {
        let mut m = vm();
        m.push(Value::Num(69.0));
        mtof(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(440.0)]);
    }

    #[test]
    fn one_beat_at_120_bpm_is_24000_frames_at_48k() {
        let mut m = vm();
        m.push(Value::Num(1.0));
        beats(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(24000.0)]);
    }

    #[test]
    fn periods_reads_freq_from_the_env() {
        let mut m = vm();
        m.env.bind(":freq".into(), Value::Num(480.0));
        m.push(Value::Num(1.0));
        periods(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(100.0)]);
    }

    #[test]
    fn db_zero_is_unity_gain() {
        let mut m = vm();
        m.push(Value::Num(0.0));
        db(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(1.0)]);
    }
}
