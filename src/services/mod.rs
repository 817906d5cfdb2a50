pub mod cleanup;
pub mod probe;
pub mod publisher;
pub mod rotation;
pub mod rotation_service;
pub mod staging;
pub mod storage;
pub mod transcoder;
pub mod worker;
