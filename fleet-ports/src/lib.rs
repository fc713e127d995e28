//! Port range allocation for fleet workspaces.
//!
//! Each workspace gets a contiguous block of host ports; this crate owns
//! the persisted allocation table and the first-fit gap search that keeps
//! all live allocations disjoint.

pub mod allocator;
pub mod policy;
pub mod range;

pub use allocator::{Allocation, PortAllocator};
pub use policy::RangePolicy;
pub use range::PortRange;
