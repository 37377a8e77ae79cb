//! Asset loading (spec §4.11): `.wav`/`.mp3` samples and `.tape` source
//! files, resolved relative to `vm.asset_dir` and resampled to the
//! engine's working sample rate on the way in.

use std::fs;
use std::path::Path;

use mixtape_core::{resample, Error, Result, Value};

use crate::dispatch::Registry;
use crate::parser::parse;
use crate::vm::Vm;

fn load_tape_source(vm: &mut Vm, path: &Path) -> Result<Value> {
    let src = fs::read_to_string(path)
        .map_err(|e| Error::Io { message: format!("load: {}: {e}", path.display()) })?;
    let file: std::rc::Rc<str> = path.display().to_string().into();
    let program = parse(file, &src)?;

    let mut sub = Vm::new(vm.registry.clone(), vm.transport, vm.asset_dir.clone());
    sub.eval(&program)?;
    sub.pop("load")
}

fn load(vm: &mut Vm) -> Result<()> {
    let path_v = vm.pop("load")?;
    let rel = path_v.as_str().ok_or_else(|| Error::type_mismatch("load: expected a path string"))?;
    let path = vm.asset_dir.join(rel);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();

    let value = match ext.as_str() {
        "tape" => load_tape_source(vm, &path)?,
        "wav" | "mp3" => {
            let tape = mixtape_core::format::load(&path)?;
            let target_sr = vm.transport.sample_rate;
            let tape = if tape.sample_rate() != target_sr {
                let ratio = target_sr as f64 / tape.sample_rate() as f64;
                tape.resample(resample::Converter::SincBest, ratio)?
            } else {
                tape
            };
            Value::Tape(tape)
        }
        other => return Err(Error::domain(format!("load: unsupported extension `{other}`"))),
    };

    vm.push(value);
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register("load", load);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_core::time::Transport;
    use std::rc::Rc;

    fn vm_in(dir: &Path) -> Vm {
        Vm::new(Rc::new(Registry::new()), Transport::new(48000, 120.0, 960), dir.to_path_buf())
    }

    #[test]
    fn loads_a_tape_source_file_and_returns_its_top_value() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("patch.tape"), "1 2 +").unwrap();
        let mut m = vm_in(dir.path());
        m.push(Value::str("patch.tape"));
        load(&mut m).unwrap();
        assert_eq!(m.stack, vec![Value::Num(3.0)]);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        let mut m = vm_in(dir.path());
        m.push(Value::str("notes.txt"));
        assert!(load(&mut m).is_err());
    }
}
