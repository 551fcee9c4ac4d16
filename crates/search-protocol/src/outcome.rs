//! What a job reports when it returns.

use crate::alert::{Alert, MaxAlerter};
use crate::error::{ErrorSet, JobError, JobResult};

/// A job's alert and error, reported together.
///
/// A job can succeed with an alert, fail without one, or do both at once
/// (a combinator whose children partly failed). Callers should prefer the
/// alert for user messaging when both are present.
#[derive(Debug, Default)]
#[must_use]
pub struct Outcome {
    pub alert: Option<Alert>,
    pub error: Option<JobError>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn new(alert: Option<Alert>, error: Option<JobError>) -> Self {
        Self { alert, error }
    }

    pub fn failed(error: JobError) -> Self {
        Self {
            alert: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Fold this outcome into running alert and error accumulators.
    pub fn record(self, alerts: &mut MaxAlerter, errors: &mut ErrorSet) {
        alerts.add(self.alert);
        errors.extend(self.error);
    }

    pub fn into_result(self) -> JobResult<Option<Alert>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.alert),
        }
    }
}

impl From<JobResult<Option<Alert>>> for Outcome {
    fn from(res: JobResult<Option<Alert>>) -> Self {
        match res {
            Ok(alert) => Outcome::new(alert, None),
            Err(err) => Outcome::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_folds_alerts_and_errors() {
        let mut alerts = MaxAlerter::default();
        let mut errors = ErrorSet::default();
        Outcome::new(Some(Alert::new(1, "a", "")), Some(JobError::Cancelled))
            .record(&mut alerts, &mut errors);
        Outcome::new(Some(Alert::new(3, "b", "")), None).record(&mut alerts, &mut errors);

        assert_eq!(alerts.into_alert().unwrap().title, "b");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_into_result_prefers_error() {
        let outcome = Outcome::new(Some(Alert::new(1, "a", "")), Some(JobError::Cancelled));
        assert!(outcome.into_result().is_err());
        assert!(Outcome::from(Ok(None)).is_ok());
    }
}
