//! Administrative command protocol
//!
//! ## Commands (admin → server)
//!
//! | Event             | Payload              | Reply                        |
//! |-------------------|----------------------|------------------------------|
//! | `disciples`       | query                | `response:json` record array |
//! | `disciples:flush` | query                | `response:text`              |
//! | `models`          | query                | `response:json` record array |
//! | `model`           | `{id?, name, ...}`   | `response:json` status       |
//! | `model:drop`      | query (non-empty)    | `response:text`              |
//!
//! Payloads are relaxed object literals, e.g. `status: connected, limit: 5`.
//! Every command receives exactly one reply.

pub mod channel;
pub mod dispatcher;

pub use channel::{AdminChannel, AdminResponse, RecordingChannel, RESPONSE_JSON, RESPONSE_TEXT};
pub use dispatcher::{AdminCommand, AdminDispatcher};
