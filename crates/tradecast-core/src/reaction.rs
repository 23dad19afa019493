//! Accept/reject outcome of a validating transformation.
//!
//! `Reaction<T>` is the composable result type of the enrichment chain:
//! chaining two reactions short-circuits on the first rejection, while a
//! single stage may accumulate several independent causes through
//! `Checks` before rejecting.

use crate::error::RejectCause;

/// Tagged outcome of a transformation stage.
#[derive(Debug)]
pub enum Reaction<T> {
    /// The stage produced a value.
    Accepted(T),
    /// The stage failed; the cause list is non-empty.
    Rejected(Vec<RejectCause>),
}

impl<T> Reaction<T> {
    /// Accept with a value.
    pub fn accept(value: T) -> Self {
        Self::Accepted(value)
    }

    /// Reject with one or more causes.
    pub fn reject(causes: Vec<RejectCause>) -> Self {
        debug_assert!(!causes.is_empty(), "rejection requires at least one cause");
        Self::Rejected(causes)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Transform the accepted value, keeping causes untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reaction<U> {
        match self {
            Self::Accepted(value) => Reaction::Accepted(f(value)),
            Self::Rejected(causes) => Reaction::Rejected(causes),
        }
    }

    /// Chain a further validating stage.
    ///
    /// Short-circuits: causes accumulated by an earlier stage are carried
    /// through unchanged and the next stage never runs.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Reaction<U>) -> Reaction<U> {
        match self {
            Self::Accepted(value) => f(value),
            Self::Rejected(causes) => Reaction::Rejected(causes),
        }
    }

    pub fn into_result(self) -> Result<T, Vec<RejectCause>> {
        match self {
            Self::Accepted(value) => Ok(value),
            Self::Rejected(causes) => Err(causes),
        }
    }
}

/// Accumulator for independent field-level checks.
///
/// Every failing check is recorded; the caller sees all simultaneous
/// problems in one rejection instead of the first one only.
#[derive(Debug, Default)]
pub struct Checks {
    causes: Vec<RejectCause>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cause unless the condition holds.
    pub fn ensure(&mut self, ok: bool, cause: impl Into<RejectCause>) -> &mut Self {
        if !ok {
            self.causes.push(cause.into());
        }
        self
    }

    /// Record a cause unconditionally.
    pub fn fail(&mut self, cause: impl Into<RejectCause>) -> &mut Self {
        self.causes.push(cause.into());
        self
    }

    pub fn has_failures(&self) -> bool {
        !self.causes.is_empty()
    }

    /// Produce the accepted value if no check failed, otherwise reject
    /// with everything accumulated so far.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Reaction<T> {
        if self.causes.is_empty() {
            Reaction::Accepted(value())
        } else {
            Reaction::Rejected(self.causes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_accept_map() {
        let r = Reaction::accept(2).map(|v| v * 3);
        assert!(matches!(r, Reaction::Accepted(6)));
    }

    #[test]
    fn test_and_then_short_circuits() {
        let rejected: Reaction<i32> =
            Reaction::reject(vec![ValidationError::EmptyMarketToken.into()]);
        let mut ran = false;
        let chained = rejected.and_then(|v| {
            ran = true;
            Reaction::accept(v + 1)
        });
        assert!(!ran, "later stage must not run after rejection");
        let causes = chained.into_result().unwrap_err();
        assert_eq!(causes.len(), 1);
    }

    #[test]
    fn test_checks_accumulate_all_failures() {
        let mut checks = Checks::new();
        checks
            .ensure(false, ValidationError::EmptyMarketToken)
            .ensure(true, ValidationError::EmptyCodeToken)
            .ensure(false, ValidationError::NonPositivePrice("0".into()));

        let reaction: Reaction<()> = checks.finish(|| ());
        let causes = reaction.into_result().unwrap_err();
        assert_eq!(causes.len(), 2);
    }

    #[test]
    fn test_checks_pass_through() {
        let mut checks = Checks::new();
        checks.ensure(true, ValidationError::EmptyMarketToken);
        assert!(checks.finish(|| 7).is_accepted());
    }

    #[test]
    fn test_earlier_causes_survive_chaining() {
        let stage_one: Reaction<i32> = Reaction::reject(vec![
            ValidationError::EmptyMarketToken.into(),
            ValidationError::EmptyCodeToken.into(),
        ]);
        let causes = stage_one
            .and_then(|_| -> Reaction<i32> {
                Reaction::reject(vec![ValidationError::NonPositiveSize("0".into()).into()])
            })
            .into_result()
            .unwrap_err();
        // Both stage-one causes are preserved, the never-run stage adds none.
        assert_eq!(causes.len(), 2);
    }
}
