//! Session plumbing between the browser's cookies and the identity provider.

pub mod cookies;
pub mod provider;
pub mod role;
pub mod session;
pub mod token;
