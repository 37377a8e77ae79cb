//! The environment stack (spec §4.6).
//!
//! Mixtape has no lexical closures over the value stack; instead a word
//! body can push a fresh environment frame (a name -> value dictionary)
//! that `fetch`/`bind` read and write against, and that unison voice
//! expansion uses to inject a different `:detune`/`:pan`/`:phase` per
//! voice around the same quoted body.

use std::collections::HashMap;
use std::rc::Rc;

use mixtape_core::Value;

#[derive(Debug, Default, Clone)]
pub struct EnvFrame {
    vars: HashMap<Rc<str>, Value>,
}

impl EnvFrame {
    pub fn new() -> Self {
        EnvFrame::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: Rc<str>, value: Value) {
        self.vars.insert(name, value);
    }
}

/// A stack of environment frames. `fetch`/`bind` always operate on the top
/// frame; `fetch` falls through to outer frames when the name is missing
/// so a unison voice frame can shadow just the names it overrides.
#[derive(Debug, Default)]
pub struct EnvStack {
    frames: Vec<EnvFrame>,
}

impl EnvStack {
    pub fn new() -> Self {
        EnvStack { frames: vec![EnvFrame::new()] }
    }

    pub fn push(&mut self, frame: EnvFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<EnvFrame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    pub fn bind(&mut self, name: Rc<str>, value: Value) {
        self.frames.last_mut().expect("env stack is never empty").set(name, value);
    }

    pub fn fetch(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_falls_through_to_outer_frames() {
        let mut env = EnvStack::new();
        env.bind("freq".into(), Value::Num(440.0));
        env.push(EnvFrame::new());
        assert_eq!(env.fetch("freq"), Some(&Value::Num(440.0)));
    }

    #[test]
    fn inner_frame_shadows_outer() {
        let mut env = EnvStack::new();
        env.bind("freq".into(), Value::Num(440.0));
        env.push(EnvFrame::new());
        env.bind("freq".into(), Value::Num(220.0));
        assert_eq!(env.fetch("freq"), Some(&Value::Num(220.0)));
        env.pop();
        assert_eq!(env.fetch("freq"), Some(&Value::Num(440.0)));
    }

    #[test]
    fn cannot_pop_the_base_frame() {
        let mut env = EnvStack::new();
        assert!(env.pop().is_none());
    }
}
