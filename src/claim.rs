//! Claims, groups, and the claim registry surface.
//!
//! A claim pairs a named predicate with a signature of specifiers and an
//! optional classifier. Building a claim registers it with the checker's
//! global collection and, when a group is active, with that group's
//! collection; both are append-only until `clear`.

use crate::engine::{Checker, Verdict};
use crate::spec::Spec;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

pub type Predicate = Rc<dyn Fn(Verdict, &[Value])>;
pub type Classifier = Rc<dyn Fn(&[Value]) -> Option<String>>;

/// A named property of a predicate over generated argument tuples.
pub struct Claim {
    name: String,
    group: Option<String>,
    predicate: Predicate,
    signature: Vec<Spec>,
    classifier: Option<Classifier>,
}

impl Claim {
    /// Display label; not required to be unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group captured when the claim was built.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub(crate) fn signature(&self) -> &[Spec] {
        &self.signature
    }

    // Classify a resolved tuple. `None` means the tuple is discarded and
    // the caller retries without consuming a repetition slot; an unclassified
    // claim labels every tuple with the empty string.
    pub(crate) fn classify(&self, args: &[Value]) -> Option<String> {
        match &self.classifier {
            Some(classify) => classify(args),
            None => Some(String::new()),
        }
    }

    pub(crate) fn invoke(&self, verdict: Verdict, args: &[Value]) {
        (self.predicate)(verdict, args);
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("signature", &self.signature)
            .field("classified", &self.classifier.is_some())
            .finish()
    }
}

impl Checker {
    /// Build and register a claim.
    pub fn claim(
        &mut self,
        name: &str,
        predicate: impl Fn(Verdict, &[Value]) + 'static,
        signature: Vec<Spec>,
    ) -> Rc<Claim> {
        self.register_claim(Claim {
            name: name.to_string(),
            group: self.current_group.clone(),
            predicate: Rc::new(predicate),
            signature,
            classifier: None,
        })
    }

    /// Build and register a claim whose cases are bucketed by a classifier.
    /// Returning `None` from the classifier discards the tuple without
    /// creating a case.
    pub fn claim_classified(
        &mut self,
        name: &str,
        predicate: impl Fn(Verdict, &[Value]) + 'static,
        signature: Vec<Spec>,
        classifier: impl Fn(&[Value]) -> Option<String> + 'static,
    ) -> Rc<Claim> {
        self.register_claim(Claim {
            name: name.to_string(),
            group: self.current_group.clone(),
            predicate: Rc::new(predicate),
            signature,
            classifier: Some(Rc::new(classifier)),
        })
    }

    fn register_claim(&mut self, claim: Claim) -> Rc<Claim> {
        let claim = Rc::new(claim);
        if let Some(group) = claim.group() {
            self.groups
                .entry(group.to_string())
                .or_insert_with(Vec::new)
                .push(Rc::clone(&claim));
        }
        self.claims.push(Rc::clone(&claim));
        claim
    }

    /// File subsequently built claims under `name`.
    pub fn group(&mut self, name: &str) -> &mut Checker {
        self.current_group = Some(name.to_string());
        self
    }

    /// Stop filing claims under a group.
    pub fn ungroup(&mut self) -> &mut Checker {
        self.current_group = None;
        self
    }

    /// Drop every registered claim and group, and clear the current group.
    pub fn clear(&mut self) -> &mut Checker {
        self.claims.clear();
        self.groups.clear();
        self.current_group = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_capture_the_active_group() {
        let mut checker = Checker::with_seed(0);
        let sig = vec![checker.literal(0)];
        let loose = checker.claim("loose", |v, _| v.holds(true), sig);
        checker.group("arith");
        let sig = vec![checker.literal(0)];
        let grouped = checker.claim("grouped", |v, _| v.holds(true), sig);
        checker.ungroup();
        let sig = vec![checker.literal(0)];
        let after = checker.claim("after", |v, _| v.holds(true), sig);

        assert_eq!(loose.group(), None);
        assert_eq!(grouped.group(), Some("arith"));
        assert_eq!(after.group(), None);
        assert_eq!(checker.claims.len(), 3);
        assert_eq!(checker.groups.get("arith").map(Vec::len), Some(1));
    }

    #[test]
    fn groups_preserve_insertion_order() {
        let mut checker = Checker::with_seed(0);
        checker.group("g");
        for name in &["first", "second", "third"] {
            let sig = vec![checker.literal(0)];
            checker.claim(name, |v, _| v.holds(true), sig);
        }
        let names: Vec<&str> = checker.groups["g"].iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn clear_resets_claims_groups_and_current_group() {
        let mut checker = Checker::with_seed(0);
        checker.group("g");
        let sig = vec![checker.literal(0)];
        checker.claim("c", |v, _| v.holds(true), sig);
        checker.clear();
        assert!(checker.claims.is_empty());
        assert!(checker.groups.is_empty());
        let sig = vec![checker.literal(0)];
        let fresh = checker.claim("fresh", |v, _| v.holds(true), sig);
        assert_eq!(fresh.group(), None);
    }
}
