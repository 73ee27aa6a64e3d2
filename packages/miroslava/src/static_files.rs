use std::path::{Component, Path, PathBuf};

use miroslava_http_models::StatusCode;

use crate::{Error, exceptions::HttpException, response::Response};

pub const DEFAULT_STATIC_URL_PATH: &str = "static";

/// Resolve `path` inside `folder`.
///
/// `None` if the path would leave the folder.
#[must_use]
pub fn safe_join(folder: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|x| !matches!(x, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(folder.join(relative))
}

/// Serve the file at `path` below `folder`.
///
/// Missing files and paths escaping `folder` are `404 Not Found`.
///
/// # Errors
///
/// * If the file exists but can't be read
pub async fn send_from_directory(folder: &Path, path: &str) -> Result<Response, Error> {
    let Some(file) = safe_join(folder, path) else {
        log::debug!("Refusing to serve '{path}' from outside of {}", folder.display());
        return Ok(HttpException::new(StatusCode::NotFound).to_response());
    };

    match tokio::fs::metadata(&file).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => {
            log::debug!("Static file {} not found", file.display());
            return Ok(HttpException::new(StatusCode::NotFound).to_response());
        }
    }

    let data = tokio::fs::read(&file).await?;
    let mimetype = mime_guess::from_path(&file).first_or_octet_stream();

    Ok(Response::new(data).with_mimetype(mimetype.essence_str()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn safe_join_rejects_parent_components() {
        let folder = Path::new("/srv/static");
        assert_eq!(
            safe_join(folder, "/css/site.css"),
            Some(PathBuf::from("/srv/static/css/site.css"))
        );
        assert_eq!(safe_join(folder, "../secret.txt"), None);
        assert_eq!(safe_join(folder, "css/../../secret.txt"), None);
    }

    #[test_log::test(tokio::test)]
    async fn serves_file_with_guessed_mimetype() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("blob.unknownext"), [0_u8, 1, 2]).unwrap();

        let response = send_from_directory(dir.path(), "/app.js").await.unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "console.log(1)");
        assert!(response.content_type().unwrap().contains("javascript"));

        let response = send_from_directory(dir.path(), "blob.unknownext").await.unwrap();
        assert_eq!(response.content_type(), Some("application/octet-stream"));
    }

    #[test_log::test(tokio::test)]
    async fn missing_file_and_directories_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();

        let response = send_from_directory(dir.path(), "nope.css").await.unwrap();
        assert_eq!(response.status_code(), 404);

        let response = send_from_directory(dir.path(), "css").await.unwrap();
        assert_eq!(response.status_code(), 404);
    }
}
