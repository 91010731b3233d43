//! `pipesock-protocol` — wire types pushed to subscribers.
//!
//! The protocol is push-only. A subscriber receives exactly two frame shapes:
//!
//! | Frame      | When                     | JSON                           |
//! |------------|--------------------------|--------------------------------|
//! | history    | once, right after joining | array of broadcast objects    |
//! | broadcast  | after every non-empty flush | one broadcast object        |
//!
//! A broadcast object is `{"Time": ..., "Messages": [{"Time": ..., "Message": ...}]}`,
//! the shape existing viewer pages read.

pub mod frames;

pub use frames::{encode_broadcast, encode_history, Broadcast, Event};
