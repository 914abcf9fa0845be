//! Shared data model, byte-level I/O primitives and container parsing for
//! the resin-slice-to-NanoDLP conversion pipeline.
//!
//! This crate has no PNG, ZIP or threading concerns of its own: it produces
//! parsed container descriptors and raw layer byte ranges for the codec and
//! pipeline crates to consume.

pub mod container;
pub mod error;
pub mod limits;
pub mod profiles;
pub mod reader;
pub mod types;

pub use container::{ContainerKind, Parser};
pub use error::{Error, Result};
pub use types::{
    BoardType, ConversionResult, LayerAreaInfo, LayerDef, PlateMetadata, PrinterProfile,
    ResolutionClass, SliceFileDescriptor, SourceInfo,
};
