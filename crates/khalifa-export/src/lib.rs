//! # khalifa-export: Spreadsheets and Documents
//!
//! Produces the downloadable artifacts of the store manager: CSV sheets that
//! open directly in Excel and print-ready A4 PDF documents.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Export Pipeline                                  │
//! │                                                                         │
//! │  InvoiceDetails / report rows (from khalifa-db)                        │
//! │       │                                                                 │
//! │       ├──────────────────────────┐                                      │
//! │       ▼                          ▼                                      │
//! │  Sheet (sheet.rs)           DocumentLayout (layout.rs)                 │
//! │  headers + rows             title, fields, table, totals               │
//! │       │                          │                                      │
//! │       ▼                          ▼                                      │
//! │  CSV bytes (UTF-8 BOM)      text.rs: visual order + shaping            │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                             PdfRenderer (pdf.rs) → PDF bytes           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use khalifa_export::{invoice_sheet, DocumentLayout, PdfRenderer};
//!
//! let details = db.invoices().details(&invoice_id).await?;
//! let csv = invoice_sheet(&details).to_csv_bytes()?;
//!
//! let layout = DocumentLayout::invoice(&details, &config.store, &config.locale);
//! let pdf = PdfRenderer::builtin().render(&layout)?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod layout;
pub mod pdf;
pub mod sheet;
pub mod text;

#[cfg(test)]
mod fixtures;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ExportError, ExportResult};
pub use layout::{Align, Column, DocumentLayout, Field, Table, TotalLine};
pub use pdf::{PdfRenderer, RenderedDocument};
pub use sheet::{
    debtors_sheet, inventory_sheet, invoice_sheet, returns_sheet, sales_sheet, Sheet,
};
pub use text::{prepare, visual_order, BuiltinFontShaper, ShapedText, TextShaper, UnicodeFontShaper};
