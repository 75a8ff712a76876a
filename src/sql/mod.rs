//! Statement synthesis: filter grammar and the ordered shape table.

mod builder;
pub mod params;
pub use builder::{Statement, Synthesis};
pub use params::{bind_params, encode_value, parse_value, Filter};
