pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::config::{self, Config};
pub use crate::growatt::datagram::{Datagram, Status};
pub use crate::options::Options;
pub use crate::queue::ByteQueue;
pub use crate::snapshot::SnapshotCell;
pub use crate::status::StatusBoard;
pub use crate::utils::Utils;
pub use crate::{file_error, file_error_with_source, mqtt};
