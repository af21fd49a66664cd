//! Request definitions shared by the prewarm service and its CLI.
//!
//! Warmup requests are written as single-line templates:
//!
//!  - [`RequestTemplate`] parses HTTP lines like `post:/db:{"db": "true"}`
//!  - [`GrpcTemplate`] parses gRPC lines like `grpc.health.v1.Health/Check`
//!
//! Templates may contain placeholders, which the [`Interpolator`] expands into fresh values every
//! time a template is rendered into a concrete [`RequestSpec`] or [`GrpcRequest`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod interpolate;
pub mod request;

pub use interpolate::{Clock, FixedClock, Interpolator, SystemClock};
pub use request::{
    GrpcRequest, GrpcTemplate, Method, ParseError, Render, RequestSpec, RequestTemplate, parse,
    parse_grpc,
};
