#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod controller;
mod error;
mod sampling;
mod storage;
#[cfg(test)]
mod testing;

/// A linear-probing hash table with backward-shift removal.
///
/// This module provides the `HashTable` engine together with its read-only
/// iterators, the draining iterator and the mutating `CursorMut`.
pub mod hash_table;

/// A hash set over the linear-probing `HashTable`.
pub mod hash_set;

/// Entry weights and the functions that derive them from values.
pub mod weight;

/// A hash map that maintains the sum of its entries' weights.
///
/// This module provides `WeightSumMap`, its `ValueMut` write guard and the
/// `WeightedCursor` used to update or remove entries while iterating.
pub mod weight_sum;

pub use controller::Params;
pub use error::Error;
pub use error::Result;
pub use hash_set::HashSet;
#[cfg(any(test, feature = "stats"))]
pub use hash_table::DebugStats;
pub use hash_table::HashTable;
pub use storage::BitStatus;
pub use storage::ByteStatus;
pub use storage::DefaultStatus;
pub use storage::Occupancy;
pub use weight::Identity;
pub use weight::Weight;
pub use weight::WeightFn;
pub use weight_sum::ValueMut;
pub use weight_sum::TotalWeight;
pub use weight_sum::WeightSumMap;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = std::hash::RandomState;
    }
}
