//! Record filtering
//!
//! Search runs first, then the advanced rules. Rules are folded strictly left
//! to right: `r1 AND r2 OR r3` evaluates as `(r1 AND r2) OR r3`. There is no
//! operator precedence and no grouping.

mod apply;
mod operator;
mod rule;

pub use apply::*;
pub use operator::*;
pub use rule::*;

#[cfg(test)]
mod tests;
