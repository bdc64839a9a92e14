//! Lynx Bundle Container
//!
//! This crate provides the binary artifact format consumed by the Lynx
//! bundle loader: a fixed-size header (magic, version, platform and
//! content tags, exact payload length, MD5 digest) followed by the UTF-8
//! JavaScript payload.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod artifact;
pub mod encoder;
pub mod header;

pub use artifact::{decode, encode, BundleError, DecodedBundle};
pub use encoder::{ByteReader, ByteWriter, DecodeError};
pub use header::{
    BundleHeader, ContentFormat, FormatVersion, Platform, HEADER_SIZE, MAGIC,
};
