//! What a scenario expects the restricted user to observe

use rbacprobe_core::{AssertionError, AuthorizationOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Listing succeeds and returns exactly these names, in this order
    Exactly(Vec<String>),
    /// Listing is denied, or succeeds without this name
    DeniedOrExcludes(String),
    /// The operation is refused
    Denied,
}

impl Expectation {
    pub fn check(&self, outcome: &AuthorizationOutcome) -> Result<(), AssertionError> {
        match (self, outcome) {
            (Expectation::Exactly(expected), AuthorizationOutcome::Granted(actual)) => {
                if expected == actual {
                    Ok(())
                } else {
                    Err(AssertionError::Mismatch {
                        expected: expected.clone(),
                        actual: actual.clone(),
                    })
                }
            }
            (Expectation::Exactly(expected), AuthorizationOutcome::Denied(denial)) => {
                Err(AssertionError::UnexpectedDenial {
                    expected: expected.clone(),
                    denial: denial.clone(),
                })
            }
            (Expectation::DeniedOrExcludes(_), AuthorizationOutcome::Denied(_)) => Ok(()),
            (Expectation::DeniedOrExcludes(excluded), AuthorizationOutcome::Granted(actual)) => {
                if actual.contains(excluded) {
                    Err(AssertionError::UnexpectedSuccess {
                        excluded: excluded.clone(),
                        actual: actual.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            (Expectation::Denied, AuthorizationOutcome::Denied(_)) => Ok(()),
            (Expectation::Denied, AuthorizationOutcome::Granted(actual)) => {
                Err(AssertionError::NotRefused(format!("returned {:?}", actual)))
            }
        }
    }
}
