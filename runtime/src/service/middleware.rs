//! Service decorators.
//!
//! Each middleware wraps another [`Service`], forwards the call unchanged and
//! adds an observable side effect. [`ServiceBuilder`] composes them.

use std::time::Instant;

use async_trait::async_trait;
use ocistow_core::error::Result;
use ocistow_core::{Annotations, Context};

use super::Service;

/// Wraps one service in another.
pub type ServiceMiddleware = fn(Box<dyn Service>) -> Box<dyn Service>;

/// One structured event per call.
pub fn logging() -> ServiceMiddleware {
    |next| Box::new(LoggingMiddleware::new(next)) as Box<dyn Service>
}

/// One span per call.
pub fn tracing_spans() -> ServiceMiddleware {
    |next| Box::new(TracingMiddleware::new(next)) as Box<dyn Service>
}

/// Emits `component="service"` events with the method, duration, inputs and
/// error. `info` on success, `error` on failure.
pub struct LoggingMiddleware<S> {
    next: S,
}

impl<S: Service> LoggingMiddleware<S> {
    pub fn new(next: S) -> Self {
        Self { next }
    }
}

fn log_call(
    ctx: &Context,
    method: &str,
    started: Instant,
    src: Option<&str>,
    dst: &str,
    annotations: &Annotations,
    result: &Result<()>,
) {
    let took = format!("{:?}", started.elapsed());
    let src = src.unwrap_or_default();
    match result {
        Ok(()) => tracing::info!(
            component = "service",
            method,
            request_id = ctx.request_id(),
            took = %took,
            src,
            dst,
            annotations = %annotations,
            "Service call"
        ),
        Err(e) => tracing::error!(
            component = "service",
            method,
            request_id = ctx.request_id(),
            took = %took,
            src,
            dst,
            annotations = %annotations,
            err = %e,
            "Service call failed"
        ),
    }
}

#[async_trait]
impl<S: Service> Service for LoggingMiddleware<S> {
    async fn copy(
        &self,
        ctx: &Context,
        src: &str,
        dst: &str,
        annotations: &Annotations,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.next.copy(ctx, src, dst, annotations).await;
        log_call(ctx, "Copy", started, Some(src), dst, annotations, &result);
        result
    }

    async fn sign(&self, ctx: &Context, dst: &str, annotations: &Annotations) -> Result<()> {
        let started = Instant::now();
        let result = self.next.sign(ctx, dst, annotations).await;
        log_call(ctx, "Sign", started, None, dst, annotations, &result);
        result
    }
}

/// Runs each call inside a span named after the method.
pub struct TracingMiddleware<S> {
    next: S,
}

impl<S: Service> TracingMiddleware<S> {
    pub fn new(next: S) -> Self {
        Self { next }
    }
}

#[async_trait]
impl<S: Service> Service for TracingMiddleware<S> {
    #[tracing::instrument(
        name = "Copy",
        skip_all,
        fields(request_id = ctx.request_id(), src = %src, dst = %dst, annotations = %annotations),
        err(Display)
    )]
    async fn copy(
        &self,
        ctx: &Context,
        src: &str,
        dst: &str,
        annotations: &Annotations,
    ) -> Result<()> {
        self.next.copy(ctx, src, dst, annotations).await
    }

    #[tracing::instrument(
        name = "Sign",
        skip_all,
        fields(request_id = ctx.request_id(), dst = %dst, annotations = %annotations),
        err(Display)
    )]
    async fn sign(&self, ctx: &Context, dst: &str, annotations: &Annotations) -> Result<()> {
        self.next.sign(ctx, dst, annotations).await
    }
}

/// Ordered middleware chain around a core service.
///
/// The first middleware added is the outermost.
#[derive(Default)]
pub struct ServiceBuilder {
    middleware: Vec<ServiceMiddleware>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, middleware: ServiceMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build<S: Service + 'static>(self, service: S) -> Box<dyn Service> {
        self.middleware
            .into_iter()
            .rev()
            .fold(Box::new(service) as Box<dyn Service>, |inner, wrap| wrap(inner))
    }
}
