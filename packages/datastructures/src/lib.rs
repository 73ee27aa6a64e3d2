#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Containers for request data that can repeat keys.
//!
//! [`MultiDict`] keeps every value submitted for a key, which is what query
//! strings and urlencoded forms need. [`Headers`] is the same idea for HTTP
//! header fields, with case-insensitive names.

mod headers;
mod multi_dict;

pub use headers::Headers;
pub use multi_dict::MultiDict;
