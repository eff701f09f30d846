//! Pipeline stages for annotation extraction and export.
//!
//! Each submodule implements exactly one step. Only [`images`] and the
//! [`crate::source`] implementations touch the file system; everything
//! else is a pure function of its inputs, testable without a PDF engine.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──────────────────────────▶ images
//! (%PDF)    │ normalize ─▶ classify ─▶ continuation    (noWrite gate)
//!           ▼
//!        Annotation[] ──▶ group ──▶ JSON  {annotations, groupedAnnotations, callouts}
//!                    └──▶ markdown ──▶ <outputPath>/<baseName>.md
//! ```
//!
//! 1. [`input`]       : validate the configured path and PDF magic bytes
//! 2. [`extract`]     : the sequential pass over pages and annotations
//! 3. [`normalize`]   : raw entry → typed record shell plus image request
//! 4. [`classify`]    : tags, task flag and callout type from the comment
//! 5. [`continuation`]: fold continuation marks into their predecessor
//! 6. [`images`]      : render requested regions to PNG files
//! 7. [`group`]       : sort, group, and the `lastExportDate` filter
//! 8. [`markdown`]    : incremental merge against the prior note

pub mod classify;
pub mod continuation;
pub mod extract;
pub mod group;
pub mod images;
pub mod input;
pub mod markdown;
pub mod normalize;
