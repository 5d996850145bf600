//! Request culture and localized messages
//!
//! The resolved locale lives in each request's extensions and is never
//! shared between requests. Handlers read it through the [`RequestLocale`]
//! extractor (or indirectly through the response mapper) and look messages
//! up in the shared [`MessageCatalog`].

pub mod catalog;
pub mod locale;
pub mod middleware;

pub use catalog::{keys, MessageCatalog};
pub use locale::{Locale, LocaleError};
pub use middleware::{CultureResolver, RequestLocale};
