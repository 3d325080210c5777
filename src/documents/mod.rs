//! Spreadsheet extraction and document rendering
//!
//! The conversion side of the service: [`sheet`] parses uploaded CSV
//! worksheet data and pulls out the fields named by the configured cell
//! mapping; [`template`] fills a `{{placeholder}}` text template with the
//! extracted values and writes the finished proposal document.
//!
//! Both halves are plain synchronous code driven by the conversion worker —
//! the upload pipeline feeds them a fully buffered payload after the
//! chunked scan finishes.

pub mod sheet;
pub mod template;

pub use sheet::{CellAddress, CellValue, SheetError, Worksheet, extract};
pub use template::{TemplateError, generate_document, render};
