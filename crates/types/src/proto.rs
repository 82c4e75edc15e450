//! Generated protobuf types for the persisted wire layouts.

#![allow(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/cerulean.rs"));
