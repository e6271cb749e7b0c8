//! Report aggregation and external sinks.
//!
//! After a run finalizes, the cases are walked once in serial order.
//! Generation interleaves by claim order, so a boundary check on claim
//! identity splits the walk into per-claim blocks without re-sorting.
//! Exception cases and never-resolved cases both land in the lost bucket
//! of the report; the structured verdict keeps them distinct.

use crate::engine::{Case, CaseVerdict, Checker};
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Whole-run totals, delivered to the result sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub pass: usize,
    pub fail: usize,
    pub lost: usize,
}

#[derive(Default)]
pub(crate) struct Sinks {
    pub(crate) on_pass: Option<Box<dyn FnMut(&Case)>>,
    pub(crate) on_fail: Option<Box<dyn FnMut(&Case)>>,
    pub(crate) on_lost: Option<Box<dyn FnMut(&Case)>>,
    pub(crate) on_report: Option<Box<dyn FnMut(&str)>>,
    pub(crate) on_result: Option<Box<dyn FnMut(&Summary)>>,
}

impl Checker {
    /// Receive each case the moment it settles as a pass.
    pub fn on_pass(&mut self, sink: impl FnMut(&Case) + 'static) -> &mut Checker {
        self.sinks.on_pass = Some(Box::new(sink));
        self
    }

    /// Receive each case the moment it settles as a fail.
    pub fn on_fail(&mut self, sink: impl FnMut(&Case) + 'static) -> &mut Checker {
        self.sinks.on_fail = Some(Box::new(sink));
        self
    }

    /// Receive each case identified as lost (or settled by exception) at
    /// finalization.
    pub fn on_lost(&mut self, sink: impl FnMut(&Case) + 'static) -> &mut Checker {
        self.sinks.on_lost = Some(Box::new(sink));
        self
    }

    /// Receive the textual report of each completed run (detail >= 1).
    pub fn on_report(&mut self, sink: impl FnMut(&str) + 'static) -> &mut Checker {
        self.sinks.on_report = Some(Box::new(sink));
        self
    }

    /// Receive the structured summary of each completed run.
    pub fn on_result(&mut self, sink: impl FnMut(&Summary) + 'static) -> &mut Checker {
        self.sinks.on_result = Some(Box::new(sink));
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    pass: usize,
    fail: usize,
    lost: usize,
}

// Finalize a run: mark never-resolved cases lost, aggregate, and deliver
// to the sinks. Runs exactly once per run.
pub(crate) fn finalize(
    cases: &mut [Case],
    group: Option<&str>,
    detail: u8,
    sinks: &mut Sinks,
) -> Summary {
    for case in cases.iter_mut() {
        if case.verdict == CaseVerdict::Unresolved {
            case.verdict = CaseVerdict::Lost;
        }
    }
    let mut summary = Summary::default();
    let mut body = String::new();
    let mut index = 0;
    while index < cases.len() {
        let start = index;
        while index < cases.len() && Rc::ptr_eq(&cases[index].claim, &cases[start].claim) {
            index += 1;
        }
        aggregate_block(&cases[start..index], detail, sinks, &mut body, &mut summary);
    }
    if let Some(sink) = sinks.on_result.as_mut() {
        sink(&summary);
    }
    if detail >= 1 {
        let mut report = String::new();
        if let Some(group) = group {
            report.push_str(&format!("Group {}\n\n", group));
        }
        report.push_str(&body);
        report.push_str(&format!("\nTotal pass {}", summary.pass));
        if summary.fail > 0 {
            report.push_str(&format!(", fail {}", summary.fail));
        }
        if summary.lost > 0 {
            report.push_str(&format!(", lost {}", summary.lost));
        }
        report.push('\n');
        if let Some(sink) = sinks.on_report.as_mut() {
            sink(&report);
        }
    }
    summary
}

fn aggregate_block(
    block: &[Case],
    detail: u8,
    sinks: &mut Sinks,
    report: &mut String,
    summary: &mut Summary,
) {
    let mut tally = Tally::default();
    let mut classes: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut lines = String::new();
    for case in block {
        let class = if case.classification.is_empty() {
            None
        } else {
            Some(classes.entry(case.classification.as_str()).or_default())
        };
        match &case.verdict {
            CaseVerdict::Pass => {
                tally.pass += 1;
                if let Some(t) = class {
                    t.pass += 1;
                }
                if detail >= 4 {
                    push_case_line(&mut lines, "Pass", case);
                }
            }
            CaseVerdict::Fail => {
                tally.fail += 1;
                if let Some(t) = class {
                    t.fail += 1;
                }
                if detail >= 2 {
                    push_case_line(&mut lines, "FAIL", case);
                }
            }
            CaseVerdict::Exception(_) | CaseVerdict::Lost | CaseVerdict::Unresolved => {
                tally.lost += 1;
                if let Some(t) = class {
                    t.lost += 1;
                }
                if detail >= 2 {
                    push_case_line(&mut lines, "LOST", case);
                }
                if let Some(sink) = sinks.on_lost.as_mut() {
                    sink(case);
                }
            }
        }
    }
    if detail >= 1 {
        report.push_str(block[0].claim.name());
        report.push_str(": ");
        if !classes.is_empty() {
            report.push_str(&format!("{} classifications, ", classes.len()));
        }
        report.push_str(&format!("{} cases tested, {} pass", block.len(), tally.pass));
        if tally.fail > 0 {
            report.push_str(&format!(", {} fail", tally.fail));
        }
        if tally.lost > 0 {
            report.push_str(&format!(", {} lost", tally.lost));
        }
        report.push('\n');
        if detail >= 3 {
            // BTreeMap iteration gives the labels in sorted order.
            for (label, t) in &classes {
                report.push_str(&format!(" {} pass {}", label, t.pass));
                if t.fail > 0 {
                    report.push_str(&format!(" fail {}", t.fail));
                }
                if t.lost > 0 {
                    report.push_str(&format!(" lost {}", t.lost));
                }
                report.push('\n');
            }
        }
        report.push_str(&lines);
    }
    summary.pass += tally.pass;
    summary.fail += tally.fail;
    summary.lost += tally.lost;
}

fn push_case_line(lines: &mut String, kind: &str, case: &Case) {
    // Render the argument tuple the way a call would look.
    let mut tuple = serde_json::to_string(case.args()).unwrap_or_else(|_| "[]".to_string());
    if tuple.starts_with('[') {
        tuple.replace_range(..1, "(");
    }
    if tuple.ends_with(']') {
        let n = tuple.len();
        tuple.replace_range(n - 1.., ")");
    }
    lines.push_str(&format!(
        " {} [{}] {}{}\n",
        kind,
        case.serial(),
        case.classification(),
        tuple
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn capture_report(checker: &mut Checker) -> Rc<RefCell<String>> {
        let captured: Rc<RefCell<String>> = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&captured);
        checker.on_report(move |text| *sink.borrow_mut() = text.to_string());
        captured
    }

    fn failing_checker(detail: u8) -> (Checker, Rc<RefCell<String>>) {
        let mut checker = Checker::with_seed(11);
        checker.reps(10).detail(detail);
        let captured = capture_report(&mut checker);
        let sig = vec![checker.literal(60)];
        checker.claim("never above fifty", |v, args| {
            v.holds(args[0].as_int().unwrap_or(0) <= 50);
        }, sig);
        (checker, captured)
    }

    #[test]
    fn detail_one_reports_totals_only() {
        let (mut checker, captured) = failing_checker(1);
        checker.check(None).unwrap();
        let report = captured.borrow();
        assert!(report.contains("never above fifty: 10 cases tested"));
        assert!(report.contains("\nTotal pass "));
        assert!(!report.contains("FAIL ["));
    }

    #[test]
    fn detail_two_adds_failing_case_lines() {
        let (mut checker, captured) = failing_checker(2);
        let summary = checker.check(None).unwrap();
        assert_eq!(summary.fail, 10);
        let report = captured.borrow();
        assert!(report.contains(" FAIL [1] (60)"));
        assert!(!report.contains(" Pass ["));
    }

    #[test]
    fn detail_zero_is_silent() {
        let (mut checker, captured) = failing_checker(0);
        let results: Rc<RefCell<Vec<Summary>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        checker.on_result(move |summary| sink.borrow_mut().push(*summary));
        checker.check(None).unwrap();
        assert!(captured.borrow().is_empty(), "report sink must stay silent");
        assert_eq!(results.borrow().len(), 1, "result sink still fires");
    }

    #[test]
    fn detail_four_adds_passing_case_lines() {
        let mut checker = Checker::with_seed(12);
        checker.reps(3).detail(4);
        let captured = capture_report(&mut checker);
        let sig = vec![checker.literal(7)];
        checker.claim("always seven", |v, args| {
            v.holds(args[0].as_int() == Some(7));
        }, sig);
        checker.check(None).unwrap();
        let report = captured.borrow();
        assert!(report.contains(" Pass [1] (7)"));
        assert!(report.contains(" Pass [3] (7)"));
    }

    #[test]
    fn detail_three_adds_classification_breakdown() {
        let mut checker = Checker::with_seed(13);
        checker.reps(50).detail(3);
        let captured = capture_report(&mut checker);
        let sig = vec![checker.integer_range(1, 10)];
        checker.claim_classified(
            "parity",
            |v, _| v.holds(true),
            sig,
            |args| {
                let n = args[0].as_int()?;
                Some(if n % 2 == 0 { "even".to_string() } else { "odd".to_string() })
            },
        );
        checker.check(None).unwrap();
        let report = captured.borrow();
        assert!(report.contains("parity: 2 classifications, 50 cases tested"));
        assert!(report.contains(" even pass "));
        assert!(report.contains(" odd pass "));
    }

    #[test]
    fn group_checks_carry_a_group_header() {
        let mut checker = Checker::with_seed(14);
        checker.reps(2).detail(1);
        let captured = capture_report(&mut checker);
        checker.group("arith");
        let sig = vec![checker.literal(1)];
        checker.claim("one is one", |v, args| {
            v.holds(args[0].as_int() == Some(1));
        }, sig);
        checker.ungroup();
        checker.check_group("arith", None).unwrap();
        assert!(captured.borrow().starts_with("Group arith\n\n"));
    }
}
