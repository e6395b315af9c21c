//! Tests for the tiered cache.
//!
//! Test organization:
//! - read_through.rs: tier precedence, backfill and miss handling
//! - write_through.rs: fan-out writes, deletes and clears
//! - remote.rs: memory in front of a remote store
//! - support.rs: instrumented and broken tiers

mod write_through;
