use crate::utils::error::{Result, WatchError};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Listing pages and the Bot API are only reachable over http(s).
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    let invalid = |reason: String| WatchError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: url_str.to_string(),
        reason,
    };

    let url = Url::parse(url_str).map_err(|e| invalid(format!("not an absolute URL ({})", e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid("URL has no host".to_string())),
        scheme => Err(invalid(format!(
            "only http and https are supported, got {}",
            scheme
        ))),
    }
}

fn check_path_text(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() || path.contains('\0') {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "not a usable file system path".to_string(),
        });
    }
    Ok(())
}

/// The state directory may not exist yet, but must not be a regular file.
pub fn validate_state_dir(field_name: &str, path: &str) -> Result<()> {
    check_path_text(field_name, path)?;
    if Path::new(path).is_file() {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "points at a file, state is stored in a directory".to_string(),
        });
    }
    Ok(())
}

/// Files read at startup, such as the selectors file, must already exist.
pub fn validate_existing_file(field_name: &str, path: &str) -> Result<()> {
    check_path_text(field_name, path)?;
    if !Path::new(path).is_file() {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "file does not exist".to_string(),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| WatchError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("must be between {} and {}", min, max),
        });
    }
    Ok(())
}
