//! # claimcheck
//!
//! A claim-based property testing engine. A *claim* pairs a predicate with
//! a *signature* of composable value specifiers; checking a claim generates
//! many randomized argument tuples, hands each to the predicate along with
//! a one-shot verdict capability, and aggregates the pass/fail/lost
//! outcomes into a report.
//!
//! Verdicts do not have to arrive on the call stack: a predicate may park
//! its [`Verdict`] capability and settle the case later (even from another
//! thread), and a run finalizes when everything has settled, when its
//! timeout elapses, or when no outstanding capability can deliver anymore.
//!
//! ```no_run
//! use claimcheck::Checker;
//!
//! let mut checker = Checker::new();
//! let signature = vec![
//!     checker.integer_range(-100, 100),
//!     checker.integer_range(-100, 100),
//! ];
//! let summary = checker
//!     .test(
//!         "add is commutative",
//!         |verdict, args| {
//!             let (a, b) = (args[0].as_int().unwrap(), args[1].as_int().unwrap());
//!             verdict.holds(a + b == b + a);
//!         },
//!         signature,
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(summary.fail, 0);
//! ```

pub mod claim;
pub mod engine;
pub mod error;
pub mod primes;
pub mod report;
pub mod spec;
pub mod specifiers;
pub mod value;

pub use claim::{Claim, Classifier, Predicate};
pub use engine::{Case, CaseVerdict, Checker, Verdict};
pub use error::{CheckError, SpecError};
pub use primes::PrimeSequence;
pub use report::Summary;
pub use spec::{resolve, Spec};
pub use value::Value;
