/**
 * Routes Module
 * API route handlers and the helpers they share
 */

pub mod analytics;
pub mod auth;
pub mod categories;
pub mod content;
pub mod health;
pub mod posts;
pub mod upload;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

lazy_static::lazy_static! {
    /// Lowercase ASCII words joined by single hyphens
    pub static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// "Día de la Familia!" -> "dia-de-la-familia"
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase).map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Uses the supplied slug when present, otherwise derives one from `source`.
pub fn resolve_slug(supplied: Option<&str>, source: &str) -> Result<String, AppError> {
    match supplied.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if SLUG_REGEX.is_match(slug) => Ok(slug.to_string()),
        Some(_) => Err(AppError::Validation(
            "Slug may only contain lowercase letters, digits and single hyphens".into(),
        )),
        None => {
            let derived = slugify(source);
            if derived.is_empty() {
                Err(AppError::Validation(
                    "Slug could not be derived; provide one explicitly".into(),
                ))
            } else {
                Ok(derived)
            }
        }
    }
}

/// Blank optional strings from admin forms mean "not set".
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
