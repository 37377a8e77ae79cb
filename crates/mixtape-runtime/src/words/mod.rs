//! Standard word library (spec §4). Each submodule owns one area of the
//! vocabulary and registers its words into a [`crate::dispatch::Registry`];
//! [`register_all`] is the one place that has to know about all of them.

mod arithmetic;
mod collections;
mod control;
mod dsp;
mod envelope;
mod loader;
mod pitch_time;
mod stack_ops;
mod strings;
mod tape_stream;
mod unison;

use crate::dispatch::Registry;

pub fn register_all(r: &mut Registry) {
    stack_ops::register(r);
    arithmetic::register(r);
    control::register(r);
    strings::register(r);
    collections::register(r);
    tape_stream::register(r);
    dsp::register(r);
    envelope::register(r);
    unison::register(r);
    loader::register(r);
    pitch_time::register(r);
}
