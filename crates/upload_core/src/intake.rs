//! Validation at the submission boundary.

use shared::{domain::FileDescriptor, error::UploadError};

use crate::config::IntakeSettings;

pub fn validate(
    descriptor: FileDescriptor,
    settings: &IntakeSettings,
) -> Result<FileDescriptor, UploadError> {
    let name = descriptor.name.trim();
    if name.is_empty() {
        return Err(UploadError::Validation("file name is empty".into()));
    }

    let mime = mime_guess::from_path(name).first();
    let accepted = mime.as_ref().is_some_and(|mime| {
        settings
            .accepted_mime_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(mime.essence_str()))
    });
    if !accepted {
        return Err(UploadError::UnsupportedType {
            name: name.to_string(),
            mime: mime
                .map(|mime| mime.essence_str().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        });
    }

    if descriptor.size > settings.max_file_size_bytes {
        return Err(UploadError::TooLarge {
            name: name.to_string(),
            size: descriptor.size,
            limit: settings.max_file_size_bytes,
        });
    }

    Ok(FileDescriptor::new(name, descriptor.size))
}
