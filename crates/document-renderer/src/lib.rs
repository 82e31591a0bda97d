//! Document Renderer
//!
//! Produces the certificate and the application form for a registration.
//! A document is composed by loading the kind's HTML template and
//! stylesheet, inlining the logos, binding the registration's fields into the
//! template (see [`binding`] for the contract) and rasterizing the result to
//! an A4 PDF.
//!
//! **Components:**
//! - `assets`: template, stylesheet and logo loading
//! - `binding`: field values and the id/name binding into the template
//! - `rasterize`: headless Chromium and passthrough rasterizers
//! - `renderer`: output naming and the render entry point

pub mod assets;
pub mod binding;
pub mod error;
pub mod kind;
pub mod rasterize;
pub mod renderer;

pub use assets::TemplateAssets;
pub use error::{RenderError, Result};
pub use kind::DocumentKind;
pub use rasterize::{ChromiumRasterizer, PageSetup, PassthroughRasterizer, Rasterizer};
pub use renderer::{sanitize_file_component, DocumentRenderer};
