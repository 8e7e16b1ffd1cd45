//! Ingestable file extensions and extension-to-language tagging.
//!
//! Binary office/PDF formats stay outside the core: the extension set
//! here is the plain-text and source-code surface.

/// Extensions eligible for scanning and ingestion.
pub const INGESTABLE_EXTS: &[&str] = &[
    // Text / markup
    ".md", ".txt", ".rst", ".csv", ".tsv",
    ".html", ".htm", ".xml", ".json", ".yaml", ".yml", ".toml",
    // Source code
    ".py", ".js", ".ts", ".jsx", ".tsx",
    ".java", ".go", ".rs", ".c", ".h", ".cpp", ".hpp",
    ".css", ".scss", ".less",
    ".sh", ".bash", ".zsh",
    ".sql", ".r", ".jl", ".lua", ".rb", ".php", ".swift", ".kt",
];

/// Extension-to-language tag map used by auto-format ingestion.
const EXT_TAG_MAP: &[(&str, &str)] = &[
    (".md", "markdown"),
    (".txt", "text"),
    (".rst", "rst"),
    (".csv", "csv"),
    (".tsv", "csv"),
    (".html", "html"),
    (".htm", "html"),
    (".xml", "xml"),
    (".json", "json"),
    (".yaml", "yaml"),
    (".yml", "yaml"),
    (".toml", "toml"),
    (".py", "python"),
    (".js", "javascript"),
    (".ts", "typescript"),
    (".jsx", "javascript"),
    (".tsx", "typescript"),
    (".java", "java"),
    (".go", "go"),
    (".rs", "rust"),
    (".c", "c"),
    (".h", "c"),
    (".cpp", "cpp"),
    (".hpp", "cpp"),
    (".css", "css"),
    (".scss", "css"),
    (".less", "css"),
    (".sh", "shell"),
    (".bash", "shell"),
    (".zsh", "shell"),
    (".sql", "sql"),
    (".r", "r"),
    (".jl", "julia"),
    (".lua", "lua"),
    (".rb", "ruby"),
    (".php", "php"),
    (".swift", "swift"),
    (".kt", "kotlin"),
];

/// True when files with this (lowercased, dot-prefixed) extension are
/// eligible for ingestion.
pub fn is_ingestable(ext: &str) -> bool {
    INGESTABLE_EXTS.contains(&ext)
}

/// Language tag for an extension, when one exists.
pub fn language_tag(ext: &str) -> Option<&'static str> {
    EXT_TAG_MAP.iter().find(|(e, _)| *e == ext).map(|(_, tag)| *tag)
}

/// Lowercased, dot-prefixed extension of a path (empty when absent).
pub fn ext_of(path: &std::path::Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
