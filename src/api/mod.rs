//! Backend-facing types: wire formats, domain records, transport and mutations.

pub mod api_types;
pub mod client;
pub mod mutation;
pub mod normalize;
pub mod resource;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpTransport, RequestDescriptor, Response, Transport};
pub use mutation::{Attachment, FieldValue, MutationBuilder, MutationKind, MutationRequest};
pub use resource::Resource;
pub use types::{Article, ArticleStatus, Property, PropertyStatus, PropertyType, ReferenceEntity};
