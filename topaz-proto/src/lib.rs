//! # Topaz Proto
//!
//! Built-in schemas of the Topaz directory (`aserto.directory.*.v3`) and authorizer
//! (`aserto.authorizer.v2`) APIs, compiled at build time into an encoded
//! `FileDescriptorSet`. The set includes its imports, so the well-known
//! `google.protobuf` types the APIs depend on are part of it.
use prost_reflect::{DescriptorError, DescriptorPool};

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");

/// Decodes [`FILE_DESCRIPTOR_SET`] into a fresh [`DescriptorPool`].
pub fn descriptor_pool() -> Result<DescriptorPool, DescriptorError> {
    DescriptorPool::decode(FILE_DESCRIPTOR_SET)
}
