//! Standard library builtins
//!
//! None of these need a permission. Builtins never mutate their arguments:
//! list helpers such as `append` and `pop` return a new list.

mod list;
mod math;
mod output;
mod text;
mod time;
mod types;

use crate::registry::BuiltinRegistry;

/// Register every standard library builtin
pub fn register_all(registry: &mut BuiltinRegistry) {
    output::register(registry);
    time::register(registry);
    math::register(registry);
    text::register(registry);
    list::register(registry);
    types::register(registry);
}
