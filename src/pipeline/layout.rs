//! Stage 1: markdown + stylesheets → paginated PDF.
//!
//! [`LayoutEngine`] is the seam; [`PandocLayout`] is the production
//! implementation. pandoc reads the markdown, emits standalone HTML5 linking
//! both stylesheets, and hands it to a CSS paged-media engine (WeasyPrint by
//! default) which paginates it at the `@page` size from the geometry sheet.
//!
//! [`run_layout`] drives the stage inside a workspace and only returns once
//! the paginated document is confirmed present and non-empty.

use crate::config::PageGeometry;
use crate::error::StoryError;
use crate::pipeline::tool::{run_tool, ToolError, ToolRun};
use crate::pipeline::workspace::Workspace;
use crate::style::{geometry_css, StyleSheet};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Inputs for one layout invocation. All paths live inside the workspace.
#[derive(Debug, Clone)]
pub struct LayoutJob<'a> {
    /// Markdown source file.
    pub source: &'a Path,
    /// Stylesheets, applied in order (later sheets win).
    pub stylesheets: &'a [PathBuf],
    /// Target page size.
    pub geometry: PageGeometry,
    /// Where the paginated document must be written.
    pub output: &'a Path,
    /// Working directory for the process.
    pub workdir: &'a Path,
}

/// Converts a markdown file into a paginated document on disk.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Produce `job.output`. A non-zero exit is a [`ToolError::Exited`].
    async fn layout(&self, job: &LayoutJob<'_>) -> Result<ToolRun, ToolError>;
}

/// pandoc driving an HTML/CSS PDF engine.
#[derive(Debug, Clone)]
pub struct PandocLayout {
    program: PathBuf,
    pdf_engine: String,
}

impl PandocLayout {
    pub fn new(program: impl Into<PathBuf>, pdf_engine: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            pdf_engine: pdf_engine.into(),
        }
    }

    /// Command-line arguments for `job`.
    pub fn args(&self, job: &LayoutJob<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            job.source.as_os_str().to_owned(),
            "--from=markdown".into(),
            "--to=html5".into(),
            "--standalone".into(),
            // Silences pandoc's "requires a nonempty <title>" warning; a
            // `title` in the document's front matter still takes effect.
            "--metadata=pagetitle:story".into(),
        ];
        for sheet in job.stylesheets {
            let mut arg = OsString::from("--css=");
            arg.push(sheet.as_os_str());
            args.push(arg);
        }
        args.push(format!("--pdf-engine={}", self.pdf_engine).into());
        let mut output = OsString::from("--output=");
        output.push(job.output.as_os_str());
        args.push(output);
        args
    }
}

#[async_trait]
impl LayoutEngine for PandocLayout {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn layout(&self, job: &LayoutJob<'_>) -> Result<ToolRun, ToolError> {
        run_tool(&self.program, self.args(job), job.workdir).await
    }
}

/// The paginated intermediate artifact. Lives and dies with its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedDocument {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Run stage 1 inside `workspace`.
///
/// Writes the markdown and both stylesheets into their slots, invokes the
/// engine, and confirms the document exists and is non-empty. Every failure
/// is a [`StoryError::LayoutFailure`] carrying the engine's output.
pub async fn run_layout(
    engine: &dyn LayoutEngine,
    workspace: &Workspace,
    markdown: &str,
    style: &StyleSheet,
    geometry: PageGeometry,
) -> Result<PaginatedDocument, StoryError> {
    let source = workspace.source_path();
    let style_path = workspace.style_path();
    let geometry_path = workspace.geometry_path();
    let output = workspace.document_path();

    write_slot(&source, markdown.as_bytes()).await?;
    write_slot(&style_path, style.css().as_bytes()).await?;
    write_slot(&geometry_path, geometry_css(&geometry).as_bytes()).await?;
    debug!(
        "Layout inputs written: {} bytes markdown, stylesheet '{}', page {}",
        markdown.len(),
        style.name(),
        geometry
    );

    // Geometry last so no typography rule can override the page size.
    let stylesheets = [style_path, geometry_path];
    let job = LayoutJob {
        source: &source,
        stylesheets: &stylesheets,
        geometry,
        output: &output,
        workdir: workspace.path(),
    };

    let run = engine.layout(&job).await.map_err(layout_failure)?;

    let size_bytes = match tokio::fs::metadata(&output).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
        _ => {
            return Err(layout_failure(ToolError::MissingOutput {
                program: PathBuf::from(engine.name()),
                expected: output,
                diagnostics: run.diagnostics,
            }))
        }
    };

    info!(
        "{} produced {} ({} bytes) in {}ms",
        engine.name(),
        output.display(),
        size_bytes,
        run.elapsed_ms
    );

    Ok(PaginatedDocument {
        path: output,
        size_bytes,
    })
}

fn layout_failure(err: ToolError) -> StoryError {
    let (reason, diagnostics) = err.into_parts();
    StoryError::LayoutFailure {
        reason,
        diagnostics,
    }
}

async fn write_slot(path: &Path, contents: &[u8]) -> Result<(), StoryError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StoryError::LayoutFailure {
            reason: format!("failed to write '{}': {}", path.display(), e),
            diagnostics: String::new(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Copies the markdown source to the output path.
    struct CopyLayout;

    #[async_trait]
    impl LayoutEngine for CopyLayout {
        fn name(&self) -> &str {
            "copy"
        }

        async fn layout(&self, job: &LayoutJob<'_>) -> Result<ToolRun, ToolError> {
            tokio::fs::copy(job.source, job.output).await.unwrap();
            Ok(ToolRun {
                diagnostics: String::new(),
                elapsed_ms: 0,
            })
        }
    }

    /// Exits successfully without writing anything.
    struct SilentLayout;

    #[async_trait]
    impl LayoutEngine for SilentLayout {
        fn name(&self) -> &str {
            "silent"
        }

        async fn layout(&self, _job: &LayoutJob<'_>) -> Result<ToolRun, ToolError> {
            Ok(ToolRun {
                diagnostics: "[WARNING] nothing to do".into(),
                elapsed_ms: 0,
            })
        }
    }

    fn sample_job<'a>(source: &'a Path, sheets: &'a [PathBuf], output: &'a Path) -> LayoutJob<'a> {
        LayoutJob {
            source,
            stylesheets: sheets,
            geometry: PageGeometry::STORY,
            output,
            workdir: Path::new("/tmp"),
        }
    }

    #[test]
    fn pandoc_args_cover_format_css_and_engine() {
        let layout = PandocLayout::new("pandoc", "weasyprint");
        let sheets = [PathBuf::from("/ws/styles.css"), PathBuf::from("/ws/page.css")];
        let job = sample_job(Path::new("/ws/input.md"), &sheets, Path::new("/ws/output.pdf"));
        let args: Vec<String> = layout
            .args(&job)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args[0], "/ws/input.md");
        assert!(args.contains(&"--from=markdown".to_string()));
        assert!(args.contains(&"--to=html5".to_string()));
        assert!(args.contains(&"--pdf-engine=weasyprint".to_string()));
        assert!(args.contains(&"--output=/ws/output.pdf".to_string()));

        let css: Vec<&String> = args.iter().filter(|a| a.starts_with("--css=")).collect();
        assert_eq!(css, vec!["--css=/ws/styles.css", "--css=/ws/page.css"]);
    }

    #[tokio::test]
    async fn run_layout_writes_slots_and_confirms_output() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::acquire(root.path(), "ws-").unwrap();
        let style = StyleSheet::from_css("test", "body { color: red; }");

        let doc = run_layout(&CopyLayout, &ws, "# Hello", &style, PageGeometry::STORY)
            .await
            .expect("layout succeeds");

        assert_eq!(doc.path, ws.document_path());
        assert_eq!(doc.size_bytes, "# Hello".len() as u64);
        let geometry = std::fs::read_to_string(ws.geometry_path()).unwrap();
        assert!(geometry.contains("1080px 1920px"));
        let css = std::fs::read_to_string(ws.style_path()).unwrap();
        assert_eq!(css, "body { color: red; }");
    }

    #[tokio::test]
    async fn missing_document_is_layout_failure() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::acquire(root.path(), "ws-").unwrap();
        let style = StyleSheet::from_css("test", "");

        let err = run_layout(&SilentLayout, &ws, "# Hello", &style, PageGeometry::STORY)
            .await
            .unwrap_err();
        match err {
            StoryError::LayoutFailure {
                reason,
                diagnostics,
            } => {
                assert!(reason.contains("produced no output"), "got: {reason}");
                assert!(diagnostics.contains("nothing to do"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pandoc_failure_surfaces_stderr() {
        use crate::pipeline::tool::tests::write_script;

        let root = TempDir::new().unwrap();
        let script = write_script(
            root.path(),
            "fake-pandoc",
            "#!/bin/sh\necho 'Error parsing YAML metadata at (line 2, column 1)' >&2\nexit 64\n",
        );
        let ws = Workspace::acquire(root.path(), "ws-").unwrap();
        let style = StyleSheet::from_css("test", "");

        let err = run_layout(
            &PandocLayout::new(&script, "weasyprint"),
            &ws,
            "---\ntitle: [\n---\n",
            &style,
            PageGeometry::STORY,
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage(), Some(crate::error::Stage::Layout));
        assert!(err.to_string().contains("status 64"), "got: {err}");
        assert!(err
            .diagnostics()
            .unwrap()
            .contains("Error parsing YAML metadata"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pandoc_script_receives_workspace_paths() {
        use crate::pipeline::tool::tests::write_script;

        let root = TempDir::new().unwrap();
        let args_log = root.path().join("args.log");
        let script = write_script(
            root.path(),
            "fake-pandoc",
            &format!(
                r#"#!/bin/sh
echo "$@" > "{args}"
for a in "$@"; do
  case "$a" in
    --output=*) printf '%%PDF-1.7 fake' > "${{a#--output=}}" ;;
  esac
done
"#,
                args = args_log.display()
            ),
        );
        let ws = Workspace::acquire(root.path(), "ws-").unwrap();
        let style = StyleSheet::builtin();

        let doc = run_layout(
            &PandocLayout::new(&script, "weasyprint"),
            &ws,
            "# Title\n\nBody",
            &style,
            PageGeometry::STORY,
        )
        .await
        .expect("fake pandoc writes the document");

        assert!(doc.size_bytes > 0);
        let args = std::fs::read_to_string(&args_log).unwrap();
        assert!(args.contains(&ws.source_path().display().to_string()));
        assert!(args.contains("--pdf-engine=weasyprint"));
    }
}
