//! Built-in function library.
//!
//! Each module exposes a `register` function adding its functions to a
//! [`FunctionRegistry`]. Every implementation has the
//! [`EvalFn`](crate::registry::EvalFn) signature and reports failures as
//! error values.

pub mod conditional;
pub mod datetime;
pub mod info;
pub mod logical;
pub mod math;
pub mod stats;
pub mod text;
pub mod utils;

use crate::registry::FunctionRegistry;

pub fn register_builtins(reg: &mut FunctionRegistry) {
    logical::register(reg);
    info::register(reg);
    math::register(reg);
    stats::register(reg);
    conditional::register(reg);
    text::register(reg);
    datetime::register(reg);
}
