//! Immutable serving snapshot.
//!
//! A `ServingContext` is built once and shared read-only behind an `Arc`.
//! Reloading builds a new context and publishes it through `ContextHandle`;
//! requests already holding the old snapshot finish against it.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::domain::{Granularity, Observation, PeriodMode};
use crate::error::AppError;
use crate::io::artifact::ModelArtifact;
use crate::trend::{Catalog, ComparisonOutcome, TrendOutcome, compare, trend};

/// Where predictions come from.
#[derive(Debug, Clone)]
pub enum Backend {
    /// A pre-trained artifact (schema + model).
    Global(Arc<ModelArtifact>),
    /// Per-(crop, location) lines fit from the observation snapshot.
    Segment,
}

#[derive(Debug, Clone)]
pub struct ServingContext {
    observations: Arc<Vec<Observation>>,
    backend: Backend,
}

impl ServingContext {
    /// Build a context for `granularity`.
    ///
    /// Global serving without an artifact is a startup error. A segment context
    /// ignores any artifact it is handed.
    pub fn new(
        granularity: Granularity,
        observations: Vec<Observation>,
        artifact: Option<ModelArtifact>,
    ) -> Result<Self, AppError> {
        let backend = match (granularity, artifact) {
            (Granularity::Global, Some(a)) => Backend::Global(Arc::new(a)),
            (Granularity::Global, None) => {
                return Err(AppError::new(
                    5,
                    "Global serving mode requires a trained model artifact (pass --artifact).",
                ));
            }
            (Granularity::Segment, _) => Backend::Segment,
        };
        info!(
            observations = observations.len(),
            mode = ?granularity,
            "serving context ready"
        );
        Ok(Self {
            observations: Arc::new(observations),
            backend,
        })
    }

    pub fn granularity(&self) -> Granularity {
        match self.backend {
            Backend::Global(_) => Granularity::Global,
            Backend::Segment => Granularity::Segment,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        match &self.backend {
            Backend::Global(a) => Some(a.as_ref()),
            Backend::Segment => None,
        }
    }

    pub fn trend(&self, crop: &str, location: &str, mode: PeriodMode) -> TrendOutcome {
        trend(&self.observations, crop, location, mode)
    }

    pub fn compare(&self, first_crop: &str, second_crop: &str, location: &str, mode: PeriodMode) -> ComparisonOutcome {
        compare(&self.observations, first_crop, second_crop, location, mode)
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::from_observations(&self.observations)
    }
}

/// Holds the current context; readers take a cheap `Arc` clone.
#[derive(Debug)]
pub struct ContextHandle {
    current: RwLock<Arc<ServingContext>>,
}

impl ContextHandle {
    pub fn new(context: ServingContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
        }
    }

    /// The context to run one request against.
    pub fn snapshot(&self) -> Arc<ServingContext> {
        Arc::clone(&*self.current.read())
    }

    /// Replace the current context, returning the previous one.
    pub fn publish(&self, context: ServingContext) -> Arc<ServingContext> {
        info!(observations = context.observations.len(), "publishing new serving context");
        std::mem::replace(&mut *self.current.write(), Arc::new(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(y: i32, price: f64) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
            crop: "Maize".to_string(),
            location: "Nairobi".to_string(),
            price,
            rainfall: None,
            temperature: None,
        }
    }

    #[test]
    fn global_without_artifact_is_a_startup_error() {
        let err = ServingContext::new(Granularity::Global, vec![obs(2021, 30.0)], None).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn segment_context_needs_only_observations() {
        let ctx = ServingContext::new(Granularity::Segment, vec![obs(2021, 30.0)], None).unwrap();
        assert_eq!(ctx.granularity(), Granularity::Segment);
        assert!(ctx.artifact().is_none());
        assert_eq!(ctx.catalog().crops, vec!["Maize"]);
    }

    #[test]
    fn snapshots_survive_a_publish() {
        let handle = ContextHandle::new(ServingContext::new(Granularity::Segment, vec![obs(2021, 30.0)], None).unwrap());
        let before = handle.snapshot();

        let next = ServingContext::new(Granularity::Segment, vec![obs(2021, 30.0), obs(2022, 40.0)], None).unwrap();
        let prev = handle.publish(next);

        assert_eq!(before.observations().len(), 1);
        assert!(Arc::ptr_eq(&before, &prev));
        assert_eq!(handle.snapshot().observations().len(), 2);
    }
}
