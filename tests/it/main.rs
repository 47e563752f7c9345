#![allow(missing_docs)]
pub mod utils;

mod inspector;
mod profiler;
mod session;
