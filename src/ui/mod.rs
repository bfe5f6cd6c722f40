/// The single-page UI served at `/`.
pub const INDEX_HTML: &str = include_str!("index.html");
