use crate::api::error::AppError;

/// Maximum stored filename length
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Validate that an owner id is present and not blank.
///
/// Returns the trimmed owner id; every core operation is scoped by it.
pub fn validate_owner_id(owner_id: &str) -> Result<&str, AppError> {
    let trimmed = owner_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(
            "owner_id is required and cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Normalize a client-supplied filename for storage: strip any path
/// components and clamp the length.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    let name = if name.is_empty() { "unnamed" } else { name };

    name.chars().take(MAX_FILENAME_LENGTH).collect()
}
