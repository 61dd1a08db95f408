//! Low-level decoding helpers shared by the table adapters.
pub(crate) mod dbf;
pub(crate) mod memo;
pub(crate) mod string;
