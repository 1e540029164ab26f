//! The application side of the gateway.
//!
//! An [`Application`] is invoked once per request with the request's
//! [`Environ`] and a [`StartResponse`] capability. It must call
//! [`StartResponse::start`] before any body byte reaches the client, and
//! returns the rest of the body as a [`Body`].
//!
//! Plain closures become applications through [`make_application`]:
//!
//! ```
//! use micro_gateway::handler::make_application;
//! use micro_gateway::protocol::{Body, BoxError};
//!
//! let app = make_application(|_environ, start_response| {
//!     start_response.start("200 OK", [("Content-Type", "text/plain")])?;
//!     Ok::<_, BoxError>(Body::single("Hello world!"))
//! });
//! # let _ = app;
//! ```

use std::sync::Arc;

use crate::gateway::StartResponse;
use crate::protocol::{Body, BoxError, Environ};

pub trait Application {
    fn call(&self, environ: &mut Environ<'_>, start_response: &mut StartResponse<'_>) -> Result<Body, BoxError>;
}

#[derive(Debug)]
pub struct ApplicationFn<F> {
    f: F,
}

impl<F, Err> Application for ApplicationFn<F>
where
    F: Fn(&mut Environ<'_>, &mut StartResponse<'_>) -> Result<Body, Err>,
    Err: Into<BoxError>,
{
    fn call(&self, environ: &mut Environ<'_>, start_response: &mut StartResponse<'_>) -> Result<Body, BoxError> {
        (self.f)(environ, start_response).map_err(Into::into)
    }
}

pub fn make_application<F, Err>(f: F) -> ApplicationFn<F>
where
    F: Fn(&mut Environ<'_>, &mut StartResponse<'_>) -> Result<Body, Err>,
    Err: Into<BoxError>,
{
    ApplicationFn { f }
}

impl<A: Application + ?Sized> Application for Box<A> {
    fn call(&self, environ: &mut Environ<'_>, start_response: &mut StartResponse<'_>) -> Result<Body, BoxError> {
        (**self).call(environ, start_response)
    }
}

impl<A: Application + ?Sized> Application for Arc<A> {
    fn call(&self, environ: &mut Environ<'_>, start_response: &mut StartResponse<'_>) -> Result<Body, BoxError> {
        (**self).call(environ, start_response)
    }
}

impl<A: Application + ?Sized> Application for &A {
    fn call(&self, environ: &mut Environ<'_>, start_response: &mut StartResponse<'_>) -> Result<Body, BoxError> {
        (**self).call(environ, start_response)
    }
}
