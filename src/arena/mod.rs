// src/arena/mod.rs

//! Result reconciliation for multiplayer quiz battles.
//!
//! Everything here except `session::watch` and the timer is pure and never fails:
//! malformed-but-typed input degrades to empty or unranked output.

pub mod anticheat;
pub mod gate;
pub mod grading;
pub mod lookup;
pub mod merge;
pub mod rank;
pub mod session;
pub mod timer;
