//! Method dispatch registry: words are looked up by `(type, name)`, with a
//! type-agnostic fallback (spec §4.6's "method dispatch by (type, name,
//! arity)" — arity is enforced by each word itself via
//! `mixtape_core::Error::ArityUnderflow`, rather than folded into the key,
//! since no word in the standard library is overloaded by argument count
//! alone).

use std::collections::HashMap;

use mixtape_core::Result;

use crate::vm::Vm;

pub type WordFn = fn(&mut Vm) -> Result<()>;

#[derive(Default)]
pub struct Registry {
    generic: HashMap<String, WordFn>,
    typed: HashMap<(String, String), WordFn>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registers a word usable regardless of the top-of-stack's type.
    pub fn register(&mut self, name: &str, f: WordFn) {
        self.generic.insert(name.to_string(), f);
    }

    /// Registers a word that only applies when the top-of-stack value has
    /// type `type_name`; it takes priority over a generic word of the same
    /// name.
    pub fn register_for(&mut self, type_name: &str, name: &str, f: WordFn) {
        self.typed.insert((type_name.to_string(), name.to_string()), f);
    }

    pub fn resolve(&self, type_name: Option<&str>, name: &str) -> Option<WordFn> {
        if let Some(ty) = type_name {
            if let Some(f) = self.typed.get(&(ty.to_string(), name.to_string())) {
                return Some(*f);
            }
        }
        self.generic.get(name).copied()
    }
}
