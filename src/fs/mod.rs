//! Filesystem adapters.
//!
//! The object store talks to disk exclusively through the
//! [`adapter::Filesystem`] trait, so tests (and embedders) can swap the
//! real filesystem for an in-memory one.

pub mod adapter;
pub mod local;
pub mod memory;

pub use adapter::{ByteStream, DirEntry, FileStat, Filesystem};
