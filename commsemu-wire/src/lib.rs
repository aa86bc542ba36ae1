#![doc = "Wire formats for the commsemu parameter bus."]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod pubsub;
pub mod sample;
