//! Expression evaluation over bound values.

pub mod expression;

pub use expression::{evaluate, EvalContext, VenueInvoker};
