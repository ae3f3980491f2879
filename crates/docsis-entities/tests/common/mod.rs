#![allow(dead_code)]

pub mod component_test;
pub mod sink;

pub use component_test::*;
pub use sink::*;
