pub mod types;
pub mod derivation;
pub mod payout;
pub mod verify;

pub use types::*;
pub use derivation::derive_outcome;
pub use payout::PayoutPolicy;
pub use verify::{verify, verify_round};
