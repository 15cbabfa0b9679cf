pub mod controller;
pub mod streaming_writer;
