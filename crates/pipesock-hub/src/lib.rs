//! `pipesock-hub` — the broadcast hub.
//!
//! # Overview
//!
//! A single tokio task owns the pending event buffer, the [`history::HistoryRing`]
//! and the subscriber [`registry::Registry`]. Producers feed it through a
//! bounded queue ([`Hub::submit`]); sessions join and leave through a
//! mailbox ([`Hub::register`], [`Hub::unregister`]).
//!
//! Every flush period the task coalesces the pending events into one
//! [`pipesock_protocol::Broadcast`], appends it to history and queues it for
//! every subscriber. Idle periods produce nothing.
//!
//! # Backpressure
//!
//! | Where              | Bound                  | When full                         |
//! |--------------------|------------------------|-----------------------------------|
//! | inbound queue      | `inbound_queue`        | `submit` returns `Full`           |
//! | pending buffer     | `max_pending`          | hub stops draining inbound queue  |
//! | subscriber queue   | per-session capacity   | subscriber dropped                |

pub mod error;
pub mod history;
pub mod hub;
pub mod registry;

pub use error::SubmitError;
pub use history::HistoryRing;
pub use hub::{FlushReport, Hub, HubConfig, HubState, HubStats};
pub use registry::{DeliveryFailure, FanOut, Frame, Registry, Subscriber, SubscriberId};
