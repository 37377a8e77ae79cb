//! Unison word (spec §4.10): spreads a quoted oscillator body across a
//! symmetric fan of detuned, panned voices and sums the result.
//!
//! The body reads its per-voice parameters with `>detune`, `>pan`, and
//! `>phase`, bound fresh in a child environment frame for each voice.

use mixtape_core::unison::expand;
use mixtape_core::{Error, Result, Stream, Value};

use crate::dispatch::Registry;
use crate::env::EnvFrame;
use crate::vm::Vm;

fn pop_quotation(vm: &mut Vm, word: &str) -> Result<Vec<Value>> {
    let v = vm.pop(word)?;
    v.as_vec()
        .map(|rc| rc.as_ref().clone())
        .ok_or_else(|| Error::type_mismatch(format!("{word}: expected a quotation")))
}

fn pop_num(vm: &mut Vm, word: &str) -> Result<f64> {
    vm.pop(word)?.as_num().ok_or_else(|| Error::type_mismatch(format!("{word}: expected a number")))
}

fn unison(vm: &mut Vm) -> Result<()> {
    let body = pop_quotation(vm, "unison")?;
    let seed = pop_num(vm, "unison")? as u32;
    let phase_random = vm.pop("unison")?.truthy();
    let spread_pan = pop_num(vm, "unison")?;
    let detune_cents = pop_num(vm, "unison")?;
    let voice_count = pop_num(vm, "unison")? as usize;

    let voices = expand(voice_count, detune_cents, spread_pan, phase_random, seed);
    let mut combined: Option<Stream> = None;

    for voice in voices {
        vm.env.push(EnvFrame::new());
        vm.env.bind("detune".into(), Value::Num(voice.detune_ratio));
        vm.env.bind("pan".into(), Value::Num(voice.pan));
        vm.env.bind("phase".into(), Value::Num(voice.phase_offset));
        vm.eval(&body)?;
        let v = vm.pop("unison")?;
        let _ = vm.env.pop();
        let voice_stream = v.into_stream().ok_or_else(|| Error::type_mismatch("unison: body must leave a stream"))?;
        let panned = mixtape_core::filter::pan(voice_stream.mono(), Stream::constant(voice.pan));
        combined = Some(match combined {
            None => panned,
            Some(acc) => acc.combine(panned, |a, b| a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()),
        });
    }

    vm.push(Value::Stream(combined.unwrap_or_else(|| Stream::constant(0.0).stereo())));
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("unison", unison);
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
    fn unison_produces_a_stream() {
        let mut m = vm();
        let prog = parse("t", "3 10 0.5 0 1 { >detune 220 * stream } unison").unwrap();
        m.eval(&prog).unwrap();
        assert_eq!(m.stack.len(), 1);
        assert!(matches!(m.stack[0], Value::Stream(_)));
    }

    #[test]
    fn single_voice_unison_is_centered() {
        let mut m = vm();
        let prog = parse("t", "1 0 0 0 1 { >detune 220 * stream } unison").unwrap();
        m.eval(&prog).unwrap();
        assert!(matches!(m.stack[0], Value::Stream(_)));
    }
}
