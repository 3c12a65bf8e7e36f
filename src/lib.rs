#![allow(clippy::single_match)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::should_implement_trait)]

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate log;

#[cfg(test)]
extern crate pretty_assertions;

pub mod config;
pub mod cpu;
pub mod error;
pub mod hex;
pub mod machine;
pub mod memory;
pub mod pic;
pub mod pit;
pub mod snapshot;
pub mod tools;
