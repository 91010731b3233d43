use std::path::Path;

use tower_http::services::ServeDir;

/// Static viewer: `/` serves `index.html`, everything else maps onto the
/// view directory.
pub fn service(dir: &Path) -> ServeDir {
    ServeDir::new(dir).append_index_html_on_directories(true)
}
