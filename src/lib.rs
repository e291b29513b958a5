//! kana: local WordPress development environments on Docker.
//!
//! A site (a plain WordPress install, or a plugin or theme under
//! development) maps onto a database container, a WordPress container and
//! a shared traefik proxy routing `<site>.<app-domain>` to it.

pub mod certs;
pub mod cli;
pub mod config;
pub mod docker;
pub mod error;
pub mod proxy;
pub mod site;
pub mod testing;
