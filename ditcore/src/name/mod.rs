//! Hierarchical name model
//!
//! Distinguished names identify nodes in the directory information tree.
//! Parsing normalizes attribute types and values so that all comparisons
//! and the ancestor/parent relations used by conflict detection operate on
//! canonical form.

pub mod dn;
pub mod normalizer;

pub use dn::{Ava, Dn, Rdn};
