// Profile data model and the generic operations every other component builds on:
// path reads/writes, structural diffing, and a local completeness report.

pub mod completeness;
pub mod diff;
pub mod document;
pub mod path;

pub use document::ProfileDocument;
pub use path::ProfilePath;
