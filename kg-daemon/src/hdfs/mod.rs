//! HDFS sources: descriptors, WebHDFS access and validation.

mod source;
mod validator;
mod webhdfs;

pub use source::SourceDescriptor;
pub(crate) use source::{deserialize_opt_port, deserialize_port};
pub use validator::{HdfsValidator, SourceValidator, ValidationReport};
pub use webhdfs::{EntryKind, HdfsEntry, WebHdfsClient};

#[cfg(test)]
pub(crate) use webhdfs::fake;
