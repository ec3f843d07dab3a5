//! `GET /trigger`: forwards to the configured upstream and mirrors its reply.
//!
//! Every call, whether a response was received or the transport failed,
//! appends exactly one record to the [`LogSink`](crate::trigger_log::LogSink).

pub mod trigger_factory;
pub mod trigger_route_service;
pub mod upstream;
