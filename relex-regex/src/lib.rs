mod encoding;
mod ir;
mod range;

pub use encoding::{
    Enc, EncType, InvalidCodePoint, Policy, ASCII_ERROR, SURR_MAX, SURR_MIN, UNICODE_ERROR,
};
pub use ir::Regex;
pub use range::{Range, RangeSet};
