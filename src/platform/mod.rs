// linetail - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: standard library only.
// Must NOT depend on: core, watch, engine.

pub mod fs;
