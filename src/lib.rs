//! This library crate contains all the necessities to exchange messages between applications through Outpost.
//!
//! Submodules have been introduced to split responsibilities. Each module has a specific focus
//! and they together form a chain of dependencies from the low-level [`library`], over the Outpost [`domain`]
//! specific logic, through the executable [`harness`], up to the high-level [`modules`](module).

#![deny(missing_docs)]

pub mod domain;
pub mod harness;
pub mod library;
pub mod module;
