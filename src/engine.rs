//! The checking engine: case generation, verdict routing, finalization.
//!
//! A `Checker` owns the claim registry, the shared randomness, and the
//! reporting configuration. One call to `check`/`check_claim`/`check_group`
//! is one run: cases are generated claim by claim, verdicts are routed back
//! through one-shot [`Verdict`] capabilities, and the run finalizes exactly
//! once, when every case has settled, when the timeout elapses, or when no
//! outstanding capability can deliver any more.
//!
//! Verdict delivery is decoupled from the call stack: the capability wraps
//! a channel sender, and the run drains the receiver after generation. A
//! predicate may settle its case synchronously, hand the capability to a
//! later predicate, move it to another thread, or drop it (the case is then
//! `Lost`).

use crate::claim::Claim;
use crate::error::CheckError;
use crate::primes::PrimeSequence;
use crate::report::{self, Sinks, Summary};
use crate::spec::resolve;
use crate::value::Value;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// One-shot verdict-delivery capability for a single case.
///
/// `deliver` consumes the capability, so a predicate can settle its case at
/// most once; keeping the capability around (or moving it elsewhere) defers
/// the verdict. Dropping it without delivering leaves the case to be
/// finalized as lost. Deliveries after the run has been torn down are
/// silent no-ops.
pub struct Verdict {
    serial: u64,
    tx: Sender<(u64, Value)>,
}

impl Verdict {
    /// Serial number of the case this capability settles.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Deliver the raw verdict value: `true` is a pass, `false` a fail,
    /// anything else an exception payload (`Null` being the neutral
    /// inconclusive marker).
    pub fn deliver(self, result: impl Into<Value>) {
        let _ = self.tx.send((self.serial, result.into()));
    }

    /// Pass when `outcome` holds, fail otherwise.
    pub fn holds(self, outcome: bool) {
        self.deliver(Value::Bool(outcome));
    }

    /// Settle without a usable outcome.
    pub fn inconclusive(self) {
        self.deliver(Value::Null);
    }
}

/// Terminal (or not-yet-terminal) state of a case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseVerdict {
    Unresolved,
    Pass,
    Fail,
    Exception(Value),
    Lost,
}

/// One invocation of a claim's predicate during a run.
#[derive(Debug, Clone)]
pub struct Case {
    pub(crate) serial: u64,
    pub(crate) args: Vec<Value>,
    pub(crate) classification: String,
    pub(crate) claim: Rc<Claim>,
    pub(crate) verdict: CaseVerdict,
}

impl Case {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Classification label; empty when the claim has no classifier.
    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn claim_name(&self) -> &str {
        self.claim.name()
    }

    pub fn verdict(&self) -> &CaseVerdict {
        &self.verdict
    }
}

// Per-run case registry. Cases are pushed in serial order, so serial n
// lives at index n - 1.
pub(crate) struct Run {
    pub(crate) cases: Vec<Case>,
    pub(crate) pending: usize,
    serial: u64,
}

impl Run {
    fn new() -> Run {
        Run {
            cases: Vec::new(),
            pending: 0,
            serial: 0,
        }
    }
}

/// The claim registry and checking engine.
pub struct Checker {
    pub(crate) claims: Vec<Rc<Claim>>,
    pub(crate) groups: HashMap<String, Vec<Rc<Claim>>>,
    pub(crate) current_group: Option<String>,
    pub(crate) reps: usize,
    pub(crate) detail: u8,
    pub(crate) rng: Rc<RefCell<ChaCha8Rng>>,
    pub(crate) primes: Rc<RefCell<PrimeSequence>>,
    pub(crate) sinks: Sinks,
}

impl Checker {
    pub fn new() -> Checker {
        Checker::from_rng(ChaCha8Rng::from_entropy())
    }

    /// Deterministic generation for a given seed. Useful in tests; no
    /// replay guarantee is made across versions.
    pub fn with_seed(seed: u64) -> Checker {
        Checker::from_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(rng: ChaCha8Rng) -> Checker {
        Checker {
            claims: Vec::new(),
            groups: HashMap::new(),
            current_group: None,
            reps: 100,
            detail: 3,
            rng: Rc::new(RefCell::new(rng)),
            primes: Rc::new(RefCell::new(PrimeSequence::new())),
            sinks: Sinks::default(),
        }
    }

    /// Number of cases to try per claim (default 100).
    pub fn reps(&mut self, reps: usize) -> &mut Checker {
        self.reps = reps;
        self
    }

    /// Report verbosity, 0 (silent) through 4 (per-case pass lines).
    pub fn detail(&mut self, level: u8) -> &mut Checker {
        self.detail = level.min(4);
        self
    }

    /// Check every registered claim.
    pub fn check(&mut self, timeout: Option<Duration>) -> Result<Summary, CheckError> {
        let targets = self.claims.clone();
        self.run(targets, None, timeout)
    }

    /// Check a single claim.
    pub fn check_claim(
        &mut self,
        claim: &Rc<Claim>,
        timeout: Option<Duration>,
    ) -> Result<Summary, CheckError> {
        self.run(vec![Rc::clone(claim)], None, timeout)
    }

    /// Check every claim filed under `name`.
    pub fn check_group(
        &mut self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Summary, CheckError> {
        let targets = self
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| CheckError::UnknownGroup(name.to_string()))?;
        self.run(targets, Some(name.to_string()), timeout)
    }

    /// Build a claim and check it immediately.
    pub fn test(
        &mut self,
        name: &str,
        predicate: impl Fn(Verdict, &[Value]) + 'static,
        signature: Vec<crate::spec::Spec>,
        timeout: Option<Duration>,
    ) -> Result<Summary, CheckError> {
        let claim = self.claim(name, predicate, signature);
        self.check_claim(&claim, timeout)
    }

    fn run(
        &mut self,
        targets: Vec<Rc<Claim>>,
        group: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Summary, CheckError> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut run = Run::new();
        debug!(claims = targets.len(), reps = self.reps, "starting run");
        for claim in &targets {
            self.primes.borrow_mut().reset();
            let target = self.reps;
            let ceiling = target.saturating_mul(10);
            let mut generated = 0;
            for _ in 0..ceiling {
                if generated >= target {
                    break;
                }
                if self.generate_case(&mut run, claim, &tx) {
                    generated += 1;
                }
            }
            if generated < target {
                warn!(
                    claim = %claim.name(),
                    generated,
                    target,
                    "classifier discarded too many tuples; under-generating"
                );
            }
        }
        // Generation is complete; from here only outstanding capabilities
        // hold senders, so channel disconnect means no verdict can arrive.
        drop(tx);
        self.drain(&mut run, rx, timeout)?;
        let summary =
            report::finalize(&mut run.cases, group.as_deref(), self.detail, &mut self.sinks);
        debug!(
            pass = summary.pass,
            fail = summary.fail,
            lost = summary.lost,
            "run finalized"
        );
        Ok(summary)
    }

    // Generate and launch one case. Returns false when the classifier
    // discarded the tuple (the attempt still counts toward the ceiling).
    fn generate_case(
        &mut self,
        run: &mut Run,
        claim: &Rc<Claim>,
        tx: &Sender<(u64, Value)>,
    ) -> bool {
        let mut args: Vec<Value> = Vec::with_capacity(claim.signature().len());
        for spec in claim.signature() {
            // Element k sees the already-resolved prefix as context.
            let value = resolve(spec, &args);
            args.push(value);
        }
        let classification = match claim.classify(&args) {
            Some(label) => label,
            None => {
                trace!(claim = %claim.name(), "classifier discarded tuple");
                return false;
            }
        };
        run.serial += 1;
        let serial = run.serial;
        run.cases.push(Case {
            serial,
            args: args.clone(),
            classification,
            claim: Rc::clone(claim),
            verdict: CaseVerdict::Unresolved,
        });
        run.pending += 1;
        let verdict = Verdict {
            serial,
            tx: tx.clone(),
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| claim.invoke(verdict, &args)));
        if let Err(payload) = outcome {
            // The panic payload is the verdict, delivered out of band.
            let _ = tx.send((serial, panic_payload_value(payload)));
        }
        true
    }

    // Settle deliveries until every case is resolved, the deadline passes,
    // or no sender remains. Without a timeout only already-queued
    // deliveries are taken.
    fn drain(
        &mut self,
        run: &mut Run,
        rx: Receiver<(u64, Value)>,
        timeout: Option<Duration>,
    ) -> Result<(), CheckError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        while run.pending > 0 {
            let message = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("run timed out with {} cases pending", run.pending);
                        break;
                    }
                    match rx.recv_timeout(deadline - now) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => {
                            debug!("run timed out with {} cases pending", run.pending);
                            break;
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!(
                                "all verdict capabilities dropped; {} cases lost",
                                run.pending
                            );
                            break;
                        }
                    }
                }
                None => match rx.try_recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };
            self.settle(run, message)?;
        }
        // Anything still queued once pending hit zero can only be a
        // protocol violation; surface it rather than dropping it.
        while let Ok(message) = rx.try_recv() {
            self.settle(run, message)?;
        }
        Ok(())
    }

    fn settle(&mut self, run: &mut Run, message: (u64, Value)) -> Result<(), CheckError> {
        let (serial, value) = message;
        let index = (serial as usize)
            .checked_sub(1)
            .ok_or(CheckError::UnknownCase { serial })?;
        let case = run
            .cases
            .get_mut(index)
            .ok_or(CheckError::UnknownCase { serial })?;
        if case.verdict != CaseVerdict::Unresolved {
            return Err(CheckError::DoubleVerdict { serial });
        }
        case.verdict = match value {
            Value::Bool(true) => CaseVerdict::Pass,
            Value::Bool(false) => CaseVerdict::Fail,
            other => CaseVerdict::Exception(other),
        };
        run.pending -= 1;
        trace!(serial, verdict = ?case.verdict, "case settled");
        match case.verdict {
            CaseVerdict::Pass => {
                if let Some(sink) = self.sinks.on_pass.as_mut() {
                    sink(case);
                }
            }
            CaseVerdict::Fail => {
                if let Some(sink) = self.sinks.on_fail.as_mut() {
                    sink(case);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for Checker {
    fn default() -> Checker {
        Checker::new()
    }
}

// A panicking predicate delivers its payload as the verdict. A boolean
// payload carries no information distinguishable from a delivered one, so
// it is normalized to the inconclusive marker: booleans must be delivered,
// not thrown.
fn panic_payload_value(payload: Box<dyn Any + Send>) -> Value {
    if payload.downcast_ref::<bool>().is_some() {
        return Value::Null;
    }
    if let Some(s) = payload.downcast_ref::<&str>() {
        return Value::String((*s).to_string());
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return Value::String(s.clone());
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn passing_claim_passes_every_case() {
        let mut checker = Checker::with_seed(1);
        let signature = vec![checker.integer_range(0, 10)];
        let summary = checker
            .test(
                "within bounds",
                |verdict, args| {
                    let n = args[0].as_int().unwrap_or(-1);
                    verdict.holds((0..=10).contains(&n));
                },
                signature,
                None,
            )
            .unwrap();
        assert_eq!(summary.pass, 100);
        assert_eq!(summary.fail, 0);
        assert_eq!(summary.lost, 0);
    }

    #[test]
    fn dropped_capability_is_lost() {
        let mut checker = Checker::with_seed(2);
        checker.reps(5).detail(0);
        let signature = vec![checker.integer_range(0, 10)];
        let summary = checker
            .test(
                "never answers",
                |_verdict, _args| {},
                signature,
                Some(Duration::from_millis(50)),
            )
            .unwrap();
        assert_eq!(summary.pass, 0);
        assert_eq!(summary.fail, 0);
        assert_eq!(summary.lost, 5);
    }

    #[test]
    fn panicking_predicate_becomes_exception_counted_lost() {
        let mut checker = Checker::with_seed(3);
        checker.reps(4).detail(0);
        let signature = vec![checker.literal(0)];
        let summary = checker
            .test(
                "always panics",
                |_verdict, _args| panic!("boom"),
                signature,
                None,
            )
            .unwrap();
        assert_eq!(summary.lost, 4);
        assert_eq!(summary.pass + summary.fail, 0);
    }

    #[test]
    fn deliver_then_panic_is_a_double_verdict() {
        let mut checker = Checker::with_seed(4);
        checker.reps(1).detail(0);
        let signature = vec![checker.literal(0)];
        let result = checker.test(
            "answers twice",
            |verdict, _args| {
                verdict.holds(true);
                panic!("and again");
            },
            signature,
            None,
        );
        assert_eq!(result, Err(CheckError::DoubleVerdict { serial: 1 }));
    }

    #[test]
    fn deferred_verdict_settles_out_of_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let parked: Rc<RefCell<Vec<Verdict>>> = Rc::new(RefCell::new(Vec::new()));
        let mut checker = Checker::with_seed(5);
        checker.reps(1).detail(0);

        let stash = Rc::clone(&parked);
        let sig = vec![checker.literal(0)];
        checker.claim(
            "parks its verdict",
            move |verdict, _args| {
                stash.borrow_mut().push(verdict);
            },
            sig,
        );

        let stash = Rc::clone(&parked);
        let sig = vec![checker.literal(0)];
        checker.claim(
            "settles the parked case",
            move |verdict, _args| {
                for parked in stash.borrow_mut().drain(..) {
                    parked.holds(true);
                }
                verdict.holds(true);
            },
            sig,
        );

        let summary = checker.check(None).unwrap();
        assert_eq!(summary.pass, 2);
        assert_eq!(summary.lost, 0);
    }

    #[test]
    fn cross_thread_delivery_beats_the_timeout() {
        let mut checker = Checker::with_seed(6);
        checker.reps(3).detail(0);
        let signature = vec![checker.literal(0)];
        let summary = checker
            .test(
                "answers from another thread",
                |verdict, _args| {
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(5));
                        verdict.holds(true);
                    });
                },
                signature,
                Some(Duration::from_secs(2)),
            )
            .unwrap();
        assert_eq!(summary.pass, 3);
        assert_eq!(summary.lost, 0);
    }

    #[test]
    fn serials_are_unique_and_increasing() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut checker = Checker::with_seed(7);
        checker.reps(20).detail(0);
        checker.on_pass(move |case| sink.borrow_mut().push(case.serial()));
        let signature = vec![checker.literal(0)];
        checker
            .test(
                "records serials",
                |verdict, _args| verdict.holds(true),
                signature,
                None,
            )
            .unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 20);
        for window in seen.windows(2) {
            assert!(window[0] < window[1]);
        }
    }
}
