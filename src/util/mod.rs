// Copyright 2017 CoreOS, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! utility functions

use anyhow::{Context, Result};
use slog_scope::trace;
use std::fs;
use std::path::Path;

mod mount;
pub(crate) use self::mount::{mount_ro, unmount};

/// Recursively copy the directory tree at `src` into `dst`.
///
/// `dst` is created if missing; existing files in it are overwritten.
/// Symbolic links are not followed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory '{}'", dst.display()))?;

    for entry in walkdir::WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to walk '{}'", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let dest = dst.join(rel);
        let ftype = entry.file_type();
        if ftype.is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("failed to create directory '{}'", dest.display()))?;
        } else if ftype.is_file() {
            trace!("copying '{}'", entry.path().display());
            fs::copy(entry.path(), &dest).with_context(|| {
                format!(
                    "failed to copy '{}' to '{}'",
                    entry.path().display(),
                    dest.display()
                )
            })?;
        }
    }
    Ok(())
}
