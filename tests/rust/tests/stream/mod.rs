//! Event stream integration tests
//!
//! Consumer behavior against mock connections, and the full SSE path against
//! a wiremock server.

mod consumer;
mod sse;
