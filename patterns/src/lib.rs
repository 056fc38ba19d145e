//! Pattern primitives shared by the category detectors.
//!
//! Three independent pieces: domain extraction + domain glob matching,
//! URL payment-path classification, and currency extraction.

mod currency;
mod domain;
mod path;

pub use currency::{extract_amount, extract_amount_from_value};
pub use domain::{DomainGlob, DomainMatch, DomainMatchKind, DomainMatcher, extract_domain};
pub use path::{PaymentPathMatcher, PathMatch};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid domain pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
