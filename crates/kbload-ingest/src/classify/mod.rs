//! Record classification
//!
//! Every candidate is evaluated against an ordered list of predicates; the
//! first failing predicate decides its bucket. Per-record problems never
//! surface as errors, they end up in the [`QcReport`](crate::report::QcReport).

pub mod marker;
pub mod relationship;

use crate::report::BucketKind;

pub use marker::{ClassifiedStrain, MarkerClassifier, StrainGeneRecord};
pub use relationship::{AcceptedRelationship, RelationshipClassifier};

/// Why a candidate was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub bucket: BucketKind,
    pub message: String,
}

impl Rejection {
    pub fn new(bucket: BucketKind, message: impl Into<String>) -> Self {
        Self {
            bucket,
            message: message.into(),
        }
    }
}

/// Outcome of one predicate chain; `Err` carries the first failing predicate.
pub type Verdict<T> = std::result::Result<T, Rejection>;
