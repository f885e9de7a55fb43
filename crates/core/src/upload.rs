//! Upload validation for job submissions.
//!
//! A submission carries two files: the standard (reference) table and the
//! subject file to validate. Checks here run before anything touches the
//! filesystem or launches a worker.

use crate::error::CoreError;

/// Multipart field carrying the standard file.
pub const FIELD_STANDARD: &str = "standard";

/// Multipart field carrying the subject file.
pub const FIELD_SUBJECT: &str = "validation";

/// Extensions accepted for the standard file (tabular only).
pub const STANDARD_EXTENSIONS: &[&str] = &["csv"];

/// Extensions accepted for the subject file (tabular or pickled frame).
pub const SUBJECT_EXTENSIONS: &[&str] = &["csv", "pkl"];

/// Lowercased extension of `file_name`, or `""` when it has none.
pub fn extension_of(file_name: &str) -> String {
    let base = sanitize_file_name(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// Reduce a client-supplied file name to its final path component.
///
/// Both `/` and `\` are treated as separators. An empty result becomes
/// `"upload"`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Validate that the standard file carries a tabular extension.
pub fn validate_standard(file_name: &str) -> Result<(), CoreError> {
    validate_extension(file_name, STANDARD_EXTENSIONS, "Standard data must be a CSV file")
}

/// Validate that the subject file carries a tabular or pickle extension.
pub fn validate_subject(file_name: &str) -> Result<(), CoreError> {
    validate_extension(
        file_name,
        SUBJECT_EXTENSIONS,
        "Data to validate must be a CSV or PKL file",
    )
}

fn validate_extension(file_name: &str, allowed: &[&str], message: &str) -> Result<(), CoreError> {
    let ext = extension_of(file_name);
    if allowed.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{message} (got '{file_name}', allowed: {})",
            allowed
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// Both files must be present before anything else is checked.
pub fn require_both<T>(standard: Option<T>, subject: Option<T>) -> Result<(T, T), CoreError> {
    match (standard, subject) {
        (Some(standard), Some(subject)) => Ok((standard, subject)),
        _ => Err(CoreError::Validation(
            "Please upload both the standard data file and the data file to validate".into(),
        )),
    }
}
