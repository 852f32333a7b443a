// Library root: the synchronous domain layer of the companion client.
//
// Everything here is pure state and arithmetic; network, timers and the
// push transport live in `lcu-dash-app`.

pub mod dispatcher;
pub mod normalize;
pub mod persistence;
pub mod protocol;
pub mod reconciler;
pub mod slots;
pub mod stats;
pub mod store;
