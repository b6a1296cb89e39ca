//! Validation of untrusted trade proposals.
//!
//! A batch is decoded record by record, tickers are normalized, and each
//! proposal is checked against a running view of holdings and cash that
//! reflects every proposal accepted before it.

mod decode;
mod normalize;
mod rejection;
mod validator;

pub use decode::{decode_batch, decode_record, parse_amount, DecodedRecord};
pub use normalize::{is_valid_ticker, normalize_ticker};
pub use rejection::{RejectedProposal, RejectionKind, RejectionReason};
pub use validator::{BuyLimits, FundsView, ProposalValidator, ValidationReport, ValidatorState};
