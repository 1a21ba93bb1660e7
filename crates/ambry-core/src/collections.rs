//! Hash collections keyed by asset names and loader tags.
//!
//! Asset names are short strings hashed on every `get`, so the AHash variants are used
//! throughout instead of the SipHash defaults.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
