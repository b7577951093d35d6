//! Unit tests for the item lifecycle module.
