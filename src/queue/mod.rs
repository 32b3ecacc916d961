//! Intake Queue Adapter (C1): consumes durable messages and drives the
//! rest of ingest (spec §4.1).

pub mod consumer;
