use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Structured,
    Text,
    Unknown,
}

impl ArtifactKind {
    /// Classifies by extension. Paths that are not regular files are `Unknown`.
    pub fn classify(path: &Path) -> Self {
        if !path.is_file() {
            return ArtifactKind::Unknown;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => ArtifactKind::Structured,
            "txt" | "md" => ArtifactKind::Text,
            _ => ArtifactKind::Unknown,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Structured => "structured",
            ArtifactKind::Text => "text",
            ArtifactKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// File name without its final extension. Used as the join key between
/// artifacts and table rows.
pub fn base_identifier(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub base_id: String,
}

impl ArtifactFile {
    pub fn new(path: PathBuf) -> Self {
        let kind = ArtifactKind::classify(&path);
        let base_id = base_identifier(&path);
        Self { path, kind, base_id }
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// One artifact paired with the path its transformed output goes to.
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub artifact: ArtifactFile,
    pub output_path: PathBuf,
}

impl TransformJob {
    pub fn new(artifact: ArtifactFile, output_dir: &Path, output_ext: &str) -> Self {
        let output_path = output_dir.join(format!("{}.{}", artifact.base_id, output_ext));
        Self { artifact, output_path }
    }
}
