//! The warmup service.
//!
//! This crate sends a burst of synthetic requests to a freshly started service, so that its
//! connection pools, caches and lazily initialized code paths are warm before production traffic
//! arrives. It is composed of:
//!
//!  - transports: [`HttpClient`] and [`GrpcClient`], with implementations backed by `reqwest`
//!    and `tonic`
//!  - [`Target`]: the transports of a single run, constructed once the service is ready
//!  - [`Warmup`]: the dispatcher, which fans requests out to concurrent workers and fans their
//!    [`Response`]s back into a single stream
//!  - [`RequestFeed`]: renders request templates into the dispatcher's input stream
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod concurrency;
pub mod error;
pub mod feed;
pub mod grpc;
pub mod http;
pub mod target;
pub mod warmup;

pub use error::{TargetError, TransportError, WarmupError};
pub use feed::RequestFeed;
pub use grpc::{GrpcClient, TonicClient};
pub use http::{HttpClient, ReqwestClient, ReqwestClientBuilder};
pub use target::{Clients, Target, TargetOptions};
pub use warmup::{Options, RequestKind, Response, ResponseStream, Warmup};
