pub mod ledger;
pub mod market;
pub mod money;

pub use ledger::*;
pub use market::*;
pub use money::{is_zero, round2, round_dp, EPSILON};
