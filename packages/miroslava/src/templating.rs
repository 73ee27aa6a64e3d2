//! Minimal template rendering.
//!
//! Only `{{ name }}` substitution is supported. Values come from any
//! serializable context whose JSON form is an object; strings are inserted
//! as is and every other value is inserted as its JSON text. Placeholders
//! without a matching key are left untouched.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{ctx, static_files::safe_join};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{ ?([A-Za-z_][A-Za-z0-9_]*) ?\}\}").expect("Invalid Regex")
});

pub const DEFAULT_TEMPLATE_FOLDER: &str = "templates";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template(s) not found: {0:?}")]
    NotFound(Vec<String>),
    #[error("Template context must serialize to an object, got {0}")]
    InvalidContext(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// One template name or a list of names to try in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNames(Vec<String>);

impl From<&str> for TemplateNames {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for TemplateNames {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<&str>> for TemplateNames {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(ToString::to_string).collect())
    }
}

impl From<Vec<String>> for TemplateNames {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<const N: usize> From<[&str; N]> for TemplateNames {
    fn from(value: [&str; N]) -> Self {
        Self(value.into_iter().map(ToString::to_string).collect())
    }
}

/// Folder templates are loaded from: the current app's template folder, or
/// `templates` outside an application context.
#[must_use]
pub fn template_folder() -> PathBuf {
    ctx::current_app().map_or_else(
        |_| PathBuf::from(DEFAULT_TEMPLATE_FOLDER),
        |app| app.template_path(),
    )
}

/// Render the first template of `names` that exists.
///
/// ```rust,no_run
/// use miroslava::render_template;
/// use serde_json::json;
///
/// // Tries `custom.html` first and falls back to `default.html`.
/// let html = render_template(["custom.html", "default.html"], &json!({"name": "Eren"}))?;
/// # Ok::<(), miroslava::templating::TemplateError>(())
/// ```
///
/// # Errors
///
/// * If none of the templates exist
/// * If a template can't be read
/// * If the context doesn't serialize to an object
pub fn render_template(
    names: impl Into<TemplateNames>,
    context: &impl Serialize,
) -> Result<String, TemplateError> {
    render_template_in(&template_folder(), names, context)
}

/// [`render_template`] with an explicit template folder.
///
/// # Errors
///
/// * If none of the templates exist
/// * If a template can't be read
/// * If the context doesn't serialize to an object
pub fn render_template_in(
    folder: &Path,
    names: impl Into<TemplateNames>,
    context: &impl Serialize,
) -> Result<String, TemplateError> {
    let TemplateNames(names) = names.into();

    for name in &names {
        let Some(path) = safe_join(folder, name) else {
            log::debug!("Refusing to load template '{name}' from outside of {}", folder.display());
            continue;
        };
        if path.is_file() {
            log::debug!("Rendering template {}", path.display());
            let source = std::fs::read_to_string(&path)?;
            return render_template_string(&source, context);
        }
    }

    Err(TemplateError::NotFound(names))
}

/// Substitute `{{ key }}` placeholders in `source`.
///
/// # Errors
///
/// * If the context doesn't serialize to an object
pub fn render_template_string(
    source: &str,
    context: &impl Serialize,
) -> Result<String, TemplateError> {
    let context = match serde_json::to_value(context)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(TemplateError::InvalidContext(other.to_string())),
    };

    Ok(PLACEHOLDER
        .replace_all(source, |captures: &Captures<'_>| {
            match context.get(&captures[1]) {
                Some(Value::String(x)) => x.clone(),
                Some(other) => other.to_string(),
                None => captures[0].to_string(),
            }
        })
        .into_owned())
}
