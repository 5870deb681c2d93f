//! Path splitting: turns a slash-delimited string into an ordered list of
//! owned path components, the way [`crate::ops`] and [`crate::fs`] expect
//! to walk them.

use crate::error::{FsError, Result};
use crate::layout::{MAX_COMPONENT_LEN, MAX_PATH_COMPONENTS};

/// Splits `path` on `/` into at most [`MAX_PATH_COMPONENTS`] components of
/// at most [`MAX_COMPONENT_LEN`] bytes each.
///
/// Leading, trailing, and repeated slashes are tolerated and collapsed; an
/// empty path or a bare `/` yields zero components (the root itself).
pub fn split(path: &str) -> Result<Vec<String>> {
    let mut components = Vec::new();

    for raw in path.split('/') {
        if raw.is_empty() {
            continue;
        }

        if raw.len() > MAX_COMPONENT_LEN {
            return Err(FsError::InvalidPath(format!(
                "component {raw:?} exceeds {MAX_COMPONENT_LEN} bytes"
            )));
        }

        components.push(raw.to_string());

        if components.len() > MAX_PATH_COMPONENTS {
            return Err(FsError::InvalidPath(format!(
                "path exceeds {MAX_PATH_COMPONENTS} components"
            )));
        }
    }

    Ok(components)
}
