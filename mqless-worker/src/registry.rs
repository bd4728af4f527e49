//! Job type to handler mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mqless_job::{DispatchError, ErrorHandler, JobHandler, ValidationError};

/// What the dispatch cycle does with a job type registered without an error handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingErrorHandlerPolicy {
    /// Treat it like an unregistered type: the job goes to `Error` without running.
    #[default]
    Reject,
    /// Dispatch the job anyway; a handler failure is only recorded in the job status.
    Ignore,
}

#[derive(Clone)]
struct Registration {
    handler: Arc<dyn JobHandler>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

/// Handlers resolved for one job at dispatch time.
#[derive(Clone)]
pub struct Binding {
    pub handler: Arc<dyn JobHandler>,
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("handler", &"<dyn JobHandler>")
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Mapping from job type to its handler and optional error handler.
///
/// Filled before the worker starts and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    registrations: HashMap<String, Registration>,
    policy: MissingErrorHandlerPolicy,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.registrations.keys().collect();
        types.sort();
        f.debug_struct("HandlerRegistry")
            .field("job_types", &types)
            .field("policy", &self.policy)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new(policy: MissingErrorHandlerPolicy) -> Self {
        Self {
            registrations: HashMap::new(),
            policy,
        }
    }

    #[inline]
    pub fn policy(&self) -> MissingErrorHandlerPolicy {
        self.policy
    }

    /// Register the handlers of `job_type`, replacing any previous registration.
    ///
    /// Fails when `job_type` is empty or `handler` is absent. `error_handler` is optional here,
    /// but see [`MissingErrorHandlerPolicy`] for how its absence is treated at dispatch.
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        handler: Option<Arc<dyn JobHandler>>,
        error_handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Result<(), ValidationError> {
        let job_type = job_type.into();
        if job_type.is_empty() {
            return Err(ValidationError::EmptyJobType);
        }
        let Some(handler) = handler else {
            return Err(ValidationError::MissingHandler(job_type));
        };
        self.registrations.insert(
            job_type,
            Registration {
                handler,
                error_handler,
            },
        );
        Ok(())
    }

    /// Register concrete handler values for `job_type`.
    pub fn register_handler<H, E>(
        &mut self,
        job_type: impl Into<String>,
        handler: H,
        error_handler: E,
    ) -> Result<(), ValidationError>
    where
        H: JobHandler + 'static,
        E: ErrorHandler + 'static,
    {
        self.register(job_type, Some(Arc::new(handler)), Some(Arc::new(error_handler)))
    }

    #[inline]
    pub fn contains(&self, job_type: &str) -> bool {
        self.registrations.contains_key(job_type)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Resolve the handlers a job of `job_type` should run with.
    pub fn resolve(&self, job_type: &str) -> Result<Binding, DispatchError> {
        let registration = self
            .registrations
            .get(job_type)
            .ok_or_else(|| DispatchError::UnregisteredJobType(job_type.to_owned()))?;

        if registration.error_handler.is_none() && self.policy == MissingErrorHandlerPolicy::Reject
        {
            return Err(DispatchError::MissingErrorHandler(job_type.to_owned()));
        }

        Ok(Binding {
            handler: registration.handler.clone(),
            error_handler: registration.error_handler.clone(),
        })
    }
}
