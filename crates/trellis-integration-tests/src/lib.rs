//! Integration test crate for the Trellis workspace.
//!
//! No library code lives here; the `tests/` directory exercises flows
//! that cross crate boundaries (ledger concurrency, the commission
//! cascade end to end, forest invariants).
