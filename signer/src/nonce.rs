//! Per-session nonce state machine.
//!
//! A counter is valid while `next >= floor`. The floor is the nonce the venue reported when
//! the session was created and never moves. Every operation that fails leaves the counter
//! exactly as it found it.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError {
    #[error("wrong nonce: next nonce {next} is below floor {floor}")]
    BelowFloor { next: i64, floor: i64 },
    #[error("wrong nonce: cannot rewind {next} below floor {floor}")]
    RewindBelowFloor { next: i64, floor: i64 },
    #[error("wrong nonce: {next} cannot be advanced")]
    Exhausted { next: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceCounter {
    next: i64,
    floor: i64,
}

impl NonceCounter {
    /// Start a counter at the venue-reported nonce, which also becomes its floor.
    pub fn new(initial: i64) -> Self {
        Self {
            next: initial,
            floor: initial,
        }
    }

    pub fn floor(&self) -> i64 {
        self.floor
    }

    fn ensure_valid(&self) -> Result<(), NonceError> {
        if self.next < self.floor {
            return Err(NonceError::BelowFloor {
                next: self.next,
                floor: self.floor,
            });
        }
        Ok(())
    }

    pub fn current(&self) -> Result<i64, NonceError> {
        self.ensure_valid()?;
        Ok(self.next)
    }

    pub fn advance(&mut self) -> Result<i64, NonceError> {
        self.ensure_valid()?;
        self.next = self
            .next
            .checked_add(1)
            .ok_or(NonceError::Exhausted { next: self.next })?;
        Ok(self.next)
    }

    /// Step back one nonce (e.g. after a signed transaction was never submitted).
    ///
    /// The floor is checked before the counter moves, so a rejected rewind is a no-op.
    pub fn rewind(&mut self) -> Result<i64, NonceError> {
        if self.next <= self.floor {
            return Err(NonceError::RewindBelowFloor {
                next: self.next,
                floor: self.floor,
            });
        }
        self.next -= 1;
        Ok(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_counter_starts_at_floor() {
        let counter = NonceCounter::new(42);
        assert_eq!(counter.current(), Ok(42));
        assert_eq!(counter.floor(), 42);
    }

    #[test]
    fn test_current_does_not_mutate() {
        let counter = NonceCounter::new(7);
        assert_eq!(counter.current(), Ok(7));
        assert_eq!(counter.current(), Ok(7));
    }

    #[test]
    fn test_advance_then_rewind_restores() {
        let mut counter = NonceCounter::new(10);
        assert_eq!(counter.advance(), Ok(11));
        assert_eq!(counter.advance(), Ok(12));
        assert_eq!(counter.rewind(), Ok(11));
        assert_eq!(counter.rewind(), Ok(10));
        assert_eq!(counter.current(), Ok(10));
    }

    #[test]
    fn test_rewind_at_floor_is_rejected_without_mutation() {
        let mut counter = NonceCounter::new(3);
        assert_eq!(
            counter.rewind(),
            Err(NonceError::RewindBelowFloor { next: 3, floor: 3 })
        );
        assert_eq!(counter.current(), Ok(3));

        // Repeated failures never drift the counter.
        assert!(counter.rewind().is_err());
        assert!(counter.rewind().is_err());
        assert_eq!(counter.current(), Ok(3));
    }

    #[test]
    fn test_below_floor_is_reported() {
        let mut counter = NonceCounter { next: 4, floor: 5 };
        assert_eq!(
            counter.current(),
            Err(NonceError::BelowFloor { next: 4, floor: 5 })
        );
        assert_eq!(
            counter.advance(),
            Err(NonceError::BelowFloor { next: 4, floor: 5 })
        );
        assert_eq!(counter, NonceCounter { next: 4, floor: 5 });
    }

    #[test]
    fn test_advance_exhausted() {
        let mut counter = NonceCounter::new(i64::MAX);
        assert_eq!(
            counter.advance(),
            Err(NonceError::Exhausted { next: i64::MAX })
        );
        assert_eq!(counter.current(), Ok(i64::MAX));
    }

    #[derive(Clone, Copy, Debug)]
    enum Op {
        Current,
        Advance,
        Rewind,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Current), Just(Op::Advance), Just(Op::Rewind)]
    }

    proptest! {
        #[test]
        fn prop_floor_invariant_holds(
            initial in -1_000_000i64..1_000_000,
            ops in proptest::collection::vec(op(), 0..200),
        ) {
            let mut counter = NonceCounter::new(initial);
            let mut model = initial;
            for op in ops {
                match op {
                    Op::Current => prop_assert_eq!(counter.current(), Ok(model)),
                    Op::Advance => {
                        model += 1;
                        prop_assert_eq!(counter.advance(), Ok(model));
                    }
                    Op::Rewind => {
                        if model > initial {
                            model -= 1;
                            prop_assert_eq!(counter.rewind(), Ok(model));
                        } else {
                            prop_assert!(counter.rewind().is_err());
                        }
                    }
                }
                prop_assert!(counter.current().unwrap() >= counter.floor());
                prop_assert_eq!(counter.floor(), initial);
            }
        }
    }
}
