/// Hand `url` to the host's default opener. Failures are logged, never returned.
///
/// The launcher runs detached and receives the URL as a single argument, so
/// shell metacharacters inside model-supplied links are never interpreted.
pub fn open_url(url: &str) {
    match open::that_detached(url) {
        Ok(()) => tracing::debug!("Opened URL in browser: {}", url),
        Err(e) => tracing::error!("Failed to open URL {}: {}", url, e),
    }
}
