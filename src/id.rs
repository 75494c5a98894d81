//! Identifier source for model objects.
//!
//! Random v4 UUIDs; there is no registry, so concurrent callers never share state.

use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
