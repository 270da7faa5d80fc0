//! Template discovery
//!
//! A template set indexes one directory by virtual path and sorts each file
//! into output templates, control templates and assets. The resolver looks
//! names up across the sets in priority order.
//!
//! # Example
//!
//! ```text
//! UserCode/Items/Foo.override.cs.hbs  => output, written to Items/Foo.override.cs
//! UserCode/__setup.hbs                => control, rendered for its side effects
//! UserCode/Icons/Foo.unity3d          => asset, copied as is
//! Templates/header.hbs                => included as {{include "header"}}
//! ```

mod registry;
mod resolver;

pub use registry::{ScanRules, TemplateError, TemplateFile, TemplateKind, TemplateSet};
pub use resolver::{ResolveError, TemplateResolver};
