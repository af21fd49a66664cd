//! gRPC transport for warmup requests.
//!
//! The [`TonicClient`] performs unary calls without generated stubs: the message of a
//! [`GrpcRequest`](prewarm_types::GrpcRequest) is sent as the raw payload of the gRPC frame, and
//! the response payload is discarded. An empty message encodes the default value of any protobuf
//! message, which makes it suitable for most warmup and health check calls.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::{Channel, Endpoint};

use crate::error::TransportError;

/// A client that sends unary gRPC calls to the warmup target.
#[async_trait]
pub trait GrpcClient: fmt::Debug + Send + Sync {
    /// Calls `service_method` with the given message and `key: value` headers.
    async fn request(
        &self,
        service_method: &str,
        message: &str,
        headers: &[String],
    ) -> Result<(), TransportError>;

    /// Releases the connection to the target.
    ///
    /// Requests issued after closing fail with [`TransportError::Closed`].
    async fn close(&self) -> Result<(), TransportError>;
}

/// A [`GrpcClient`] backed by a [`tonic`] channel.
#[derive(Debug)]
pub struct TonicClient {
    channel: Mutex<Option<Channel>>,
}

impl TonicClient {
    /// Creates a client for the target at `url`, e.g. `http://localhost:50051`.
    ///
    /// The connection is established on the first request. Must be called from within a tokio
    /// runtime.
    pub fn connect_lazy(
        url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut endpoint = Endpoint::from_shared(url.into())?;
        if let Some(timeout) = timeout {
            endpoint = endpoint.connect_timeout(timeout).timeout(timeout);
        }

        Ok(Self {
            channel: Mutex::new(Some(endpoint.connect_lazy())),
        })
    }

    fn channel(&self) -> Result<Channel, TransportError> {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl GrpcClient for TonicClient {
    async fn request(
        &self,
        service_method: &str,
        message: &str,
        headers: &[String],
    ) -> Result<(), TransportError> {
        let path = request_path(service_method)?;

        let mut request = tonic::Request::new(Bytes::copy_from_slice(message.as_bytes()));
        for header in headers {
            let (key, value) = parse_header(header)?;
            request.metadata_mut().insert(key, value);
        }

        let mut grpc = tonic::client::Grpc::new(self.channel()?);
        grpc.ready().await?;
        grpc.unary(request, path, RawCodec)
            .await
            .map_err(|status| TransportError::Status {
                service_method: service_method.to_owned(),
                status: Box::new(status),
            })?;

        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match channel {
            Some(channel) => {
                drop(channel);
                Ok(())
            }
            None => Err(TransportError::Closed),
        }
    }
}

fn request_path(service_method: &str) -> Result<PathAndQuery, TransportError> {
    let path = format!("/{}", service_method.trim_start_matches('/'));
    PathAndQuery::try_from(path)
        .map_err(|_| TransportError::InvalidServiceMethod(service_method.to_owned()))
}

/// Splits a `key: value` header into gRPC metadata.
fn parse_header(header: &str) -> Result<(AsciiMetadataKey, AsciiMetadataValue), TransportError> {
    let invalid = || TransportError::InvalidHeader(header.to_owned());

    let (key, value) = header.split_once(':').ok_or_else(invalid)?;
    let key = AsciiMetadataKey::from_bytes(key.trim().as_bytes()).map_err(|_| invalid())?;
    let value = value.trim().parse().map_err(|_| invalid())?;

    Ok((key, value))
}

/// Passes message payloads through without any encoding.
#[derive(Clone, Copy, Debug, Default)]
struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawCodec;
    type Decoder = RawCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawCodec
    }
}

impl Encoder for RawCodec {
    type Item = Bytes;
    type Error = tonic::Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawCodec {
    type Item = Bytes;
    type Error = tonic::Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}
