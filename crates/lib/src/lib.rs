//! Folio core library: configuration, language state, backend gateway and the
//! chat session controller used by the folio CLI.

pub mod config;
pub mod gateway;
pub mod health;
pub mod i18n;
pub mod init;
pub mod session;
