//! Output generators

pub mod header;
