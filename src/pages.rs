use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};
use tracing::debug;

/// Page images of one document, decoded lazily in page order.
#[derive(Debug)]
pub struct PageSource {
    paths: Vec<PathBuf>,
    _rendered: Option<TempDir>,
}

impl PageSource {
    /// Image files are used as given; a single PDF is rendered to PNG pages.
    pub fn open(inputs: &[PathBuf], dpi: u32) -> Result<Self> {
        match inputs {
            [] => Err(anyhow!("no input files given")),
            [single] if is_pdf(single) => render_pdf_pages(single, dpi),
            _ => {
                if let Some(pdf) = inputs.iter().find(|path| is_pdf(path)) {
                    return Err(anyhow!(
                        "a PDF must be the only input (got {} alongside other files)",
                        pdf.display()
                    ));
                }
                Ok(Self {
                    paths: inputs.to_vec(),
                    _rendered: None,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = Result<DynamicImage>> + '_ {
        self.paths.iter().map(|path| {
            image::open(path).with_context(|| format!("failed to decode page {}", path.display()))
        })
    }
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn render_pdf_pages(pdf: &Path, dpi: u32) -> Result<PageSource> {
    if !pdf.exists() {
        return Err(anyhow!("pdf not found: {}", pdf.display()));
    }
    let dir = tempdir().with_context(|| "failed to create temp dir for pdf")?;
    let dpi = dpi.max(1).to_string();

    let output = if command_exists("mutool") {
        Command::new("mutool")
            .arg("draw")
            .arg("-r")
            .arg(&dpi)
            .arg("-o")
            .arg(dir.path().join("page-%04d.png"))
            .arg(pdf)
            .output()
            .with_context(|| "failed to run mutool")?
    } else if command_exists("pdftoppm") {
        Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(&dpi)
            .arg(pdf)
            .arg(dir.path().join("page"))
            .output()
            .with_context(|| "failed to run pdftoppm")?
    } else {
        return Err(anyhow!(
            "pdf rendering requires mutool or pdftoppm (install mupdf or poppler)"
        ));
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("pdf rendering failed: {}", stderr.trim()));
    }

    let paths = collect_rendered_pages(dir.path())?;
    debug!(pages = paths.len(), pdf = %pdf.display(), "rendered pdf");
    Ok(PageSource {
        paths,
        _rendered: Some(dir),
    })
}

fn collect_rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages = fs::read_dir(dir)
        .with_context(|| "failed to read temp pdf directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let named_page = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("page"));
            let png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            named_page && png
        })
        .collect::<Vec<_>>();
    pages.sort();
    Ok(pages)
}

pub(crate) fn command_exists(cmd: &str) -> bool {
    let path = Path::new(cmd);
    if path.components().count() > 1 {
        return is_executable(path);
    }
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path_var).any(|dir| is_executable(&dir.join(cmd)))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
