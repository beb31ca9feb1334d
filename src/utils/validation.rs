use crate::error::TransferError;

/// Longest name most FTP daemons accept for a single path component
pub const MAX_NAME_LEN: usize = 255;

// Would cut the public URL short at a query or fragment
const URL_RESERVED: [char; 2] = ['#', '?'];

/// Checks a remote file name before any connection is opened.
/// Path separators and traversal are rejected, never rewritten: the
/// public URL must stay predictable from the caller's input.
pub fn validate_target_name(name: &str) -> Result<&str, TransferError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(TransferError::invalid_input("Target name cannot be empty"));
    }

    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        tracing::warn!("Path traversal attempt detected in target name: {}", name);
        return Err(TransferError::invalid_input(format!(
            "Target name '{}' must be a single path component",
            name
        )));
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(TransferError::invalid_input(
            "Target name contains control characters",
        ));
    }

    if name.contains(URL_RESERVED) {
        return Err(TransferError::invalid_input(format!(
            "Target name '{}' may not contain '#' or '?'",
            name
        )));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(TransferError::invalid_input(format!(
            "Target name exceeds {} bytes",
            MAX_NAME_LEN
        )));
    }

    Ok(name)
}

/// Splits a directory path into its components. Leading/trailing and
/// doubled slashes are ignored; an empty path means the base directory.
pub fn directory_segments(path: &str) -> Result<Vec<&str>, TransferError> {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    for segment in &segments {
        if *segment == ".." {
            tracing::warn!("Path traversal attempt detected in directory: {}", path);
            return Err(TransferError::invalid_input(format!(
                "Directory path '{}' may not contain '..'",
                path
            )));
        }
        if segment.chars().any(|c| c.is_control())
            || segment.contains(URL_RESERVED)
            || segment.len() > MAX_NAME_LEN
        {
            return Err(TransferError::invalid_input(format!(
                "Invalid directory component '{}'",
                segment
            )));
        }
    }

    Ok(segments)
}
