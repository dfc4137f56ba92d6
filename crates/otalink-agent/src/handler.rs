// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Device-side hooks invoked by the orchestrator

use crate::version::version_in_url;
use std::path::Path;

pub trait UpdateHandler: Send {
    /// Version of a freshly downloaded image, reported on success.
    ///
    /// Defaults to the `X.Y.Z` found in the URL's file name. `None` leaves
    /// the reported version unchanged.
    fn resolve_version(&mut self, artifact: &Path, remote_url: &str) -> Option<String> {
        let _ = artifact;
        version_in_url(remote_url)
    }

    /// Called once per finished check: `(true, Some(url))` after an image was
    /// downloaded, `(false, None)` otherwise.
    fn on_check_complete(&mut self, updated: bool, remote_url: Option<&str>);
}
