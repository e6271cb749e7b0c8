// Deterministic prime enumeration for the unbounded integer specifier.
// Candidates advance through successive odd numbers; each is trial-divided
// by the odd factors up to a running integer square root. The state is
// reset at the start of every claim's generation loop, so within one run
// the sequence is strictly increasing and collision-free.

/// Enumerates the odd primes 3, 5, 7, 11, ... in increasing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeSequence {
    prime: u64,
    sqrt: u64,
    sq_next: u64,
}

impl PrimeSequence {
    pub fn new() -> PrimeSequence {
        PrimeSequence {
            prime: 1,
            sqrt: 1,
            sq_next: 9,
        }
    }

    pub fn reset(&mut self) {
        *self = PrimeSequence::new();
    }

    pub fn next_prime(&mut self) -> u64 {
        loop {
            self.prime += 2;
            let mut reject = false;
            if self.prime >= self.sq_next {
                // Crossed the square of the next odd root; widen the bound.
                reject = true;
                self.sqrt += 2;
                self.sq_next = (self.sqrt + 2) * (self.sqrt + 2);
            }
            let mut factor = 3;
            while !reject && factor <= self.sqrt {
                reject = self.prime % factor == 0;
                factor += 2;
            }
            if !reject {
                return self.prime;
            }
        }
    }
}

impl Default for PrimeSequence {
    fn default() -> PrimeSequence {
        PrimeSequence::new()
    }
}

impl Iterator for PrimeSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.next_prime())
    }
}
