//! Domain types for the payment pipeline.

pub mod amount;
pub mod ids;
pub mod payment;
pub mod transfer;

pub use amount::{Amount, ArithmeticError, ParseAmountError};
pub use ids::{AccountId, InvalidAccount, InvalidRequestId, RequestId};
pub use payment::{Direction, Payment};
pub use transfer::Transfer;
