// Copyright 2026 Dashtap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dashtap runtime library: browser driving, response capture and the
//! extraction engine on top of the pure `dashtap` core.
//!
//! This library crate exposes the modules for integration testing and for
//! the `dashtap` binary.

pub mod capture;
pub mod cli;
pub mod engine;
pub mod navigation;
pub mod renderer;
pub mod rest;

#[cfg(test)]
mod tests {
    #[test]
    fn test_source_headers_match_manifest_license() {
        let spdx = format!("SPDX-License-Identifier: {}", env!("CARGO_PKG_LICENSE"));
        for source in [
            include_str!("lib.rs"),
            include_str!("main.rs"),
            include_str!("rest.rs"),
        ] {
            assert!(source.lines().take(3).any(|l| l.contains(&spdx)));
        }
    }
}
