//! Typed records carried by requests and decoded from server frames.

pub mod bar;
pub mod common;
pub mod contract;
pub mod enums;
pub mod tick;
