//! Adapter implementations for item storage and process supervision ports.

pub mod fs;
pub mod memory;
pub mod process;
