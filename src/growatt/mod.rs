pub mod datagram;
pub mod frame;
pub mod interpreter;
pub mod link;
pub mod reader;
