// THEORY:
// The leaf components of the engine, ordered from the bottom up. None of them
// knows about deployment strategies; they only answer questions about pixels,
// cells, footprints and ownership.

pub mod components;
pub mod geometry;
pub mod ledger;
pub mod pixel;
pub mod priority;
pub mod region;
pub mod sensor;
