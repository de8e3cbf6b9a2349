use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use doc_model::{Rect, SearchHit, Word};
use pdf_engine::{create_engine, probe_file, EngineKind, OpenSource};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use storage::{Settings, Storage};
use tracing::warn;
use viewer_core::{Editor, EditorConfig};

#[derive(Debug, Parser)]
#[command(name = "vellum-cli")]
#[command(about = "Vellum PDF viewer and word editor")]
pub struct Cli {
    /// Document backend. Defaults to PDFium when built with it.
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Pdfium,
    Memory,
}

impl From<Backend> for EngineKind {
    fn from(value: Backend) -> Self {
        match value {
            Backend::Pdfium => EngineKind::Pdfium,
            Backend::Memory => EngineKind::Memory,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a document in the desktop app.
    Open {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the words of a page with their boxes.
    Words {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search the document for a word or phrase.
    Search {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        query: String,
        #[arg(long)]
        case_sensitive: bool,
    },
    /// Replace one word, keeping its font and size.
    Edit {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Text of the word to replace.
        #[arg(long)]
        word: String,
        /// Replacement text; empty deletes the word.
        #[arg(long = "with")]
        replacement: String,
        /// Which match of `--word` on the page, 1-based.
        #[arg(long, default_value_t = 1)]
        occurrence: usize,
        /// Write here instead of overwriting FILE.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the text inside a rectangle given in page points.
    ExtractText {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_parser = parse_rect, value_name = "X0,Y0,X1,Y1")]
        rect: Rect,
    },
    /// Save a PNG of a rectangle given in page points.
    Screenshot {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_parser = parse_rect, value_name = "X0,Y0,X1,Y1")]
        rect: Rect,
        #[arg(long, default_value_t = 2.0)]
        scale: f32,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a whole page to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 2.0)]
        scale: f32,
        /// Outline every word box.
        #[arg(long)]
        debug: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    /// `[width, height]` in points.
    page_sizes: Vec<[f32; 2]>,
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct WordsOutput<'a> {
    page: u32,
    words: &'a [Word],
}

#[derive(Debug, Serialize)]
struct HitOutput<'a> {
    page: u32,
    rect: Rect,
    text: &'a str,
}

impl<'a> From<&'a SearchHit> for HitOutput<'a> {
    fn from(hit: &'a SearchHit) -> Self {
        Self { page: hit.page_index + 1, rect: hit.rect, text: &hit.text }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    count: usize,
    hits: Vec<HitOutput<'a>>,
    query: &'a str,
}

#[derive(Debug, Serialize)]
struct EditOutput {
    page: u32,
    removed: String,
    inserted: Option<String>,
    font: &'static str,
    size: f32,
    output: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let kind = cli.backend.map(EngineKind::from).unwrap_or_else(EngineKind::preferred);

    match cli.command {
        Commands::Open { file } => run_open(&file),
        Commands::Info { file } => run_info(kind, &file),
        Commands::Words { file, page } => run_words(kind, &file, page),
        Commands::Search { file, query, case_sensitive } => {
            run_search(kind, &file, &query, case_sensitive)
        }
        Commands::Edit { file, page, word, replacement, occurrence, output } => {
            run_edit(kind, &file, page, &word, &replacement, occurrence, output.as_deref())
        }
        Commands::ExtractText { file, page, rect } => run_extract_text(kind, &file, page, &rect),
        Commands::Screenshot { file, page, rect, scale, output } => {
            run_screenshot(kind, &file, page, &rect, scale, &output)
        }
        Commands::Render { file, page, scale, debug, output } => {
            run_render(kind, &file, page, scale, debug, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn parse_rect(value: &str) -> Result<Rect, String> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|err| format!("invalid number in rectangle: {err}"))?;

    match parts.as_slice() {
        [x0, y0, x1, y1] => Ok(Rect::new(*x0, *y0, *x1, *y1)),
        _ => Err(format!("expected four comma-separated numbers, got {}", parts.len())),
    }
}

fn load_settings() -> Settings {
    match Storage::from_env_or_default().and_then(|store| store.load_settings()) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(error = %err, "using default settings");
            Settings::default()
        }
    }
}

fn open_editor(kind: EngineKind, file: &Path, render_scale: Option<f32>) -> Result<Editor> {
    ensure_file_exists(file)?;

    let settings = load_settings();
    let mut config = EditorConfig::from(&settings);
    if let Some(scale) = render_scale {
        if scale <= 0.0 || !scale.is_finite() {
            anyhow::bail!("--scale must be a positive number");
        }
        config.render_scale = scale;
    }

    let engine = create_engine(kind).context("failed to start document backend")?;
    let mut editor = Editor::new(engine, config);
    editor.open(file).context("failed to open document")?;
    Ok(editor)
}

/// Turn a 1-based page flag into an index, checking it against the document.
fn page_index(editor: &Editor, page: u32) -> Result<u32> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if page > editor.page_count() {
        anyhow::bail!("page {page} out of range (document has {} pages)", editor.page_count());
    }
    Ok(page - 1)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_open(file: &Path) -> Result<()> {
    ensure_file_exists(file)?;

    if std::env::var_os("VELLUM_TEST_NO_SPAWN").is_some() {
        println!("open:{}", file.display());
        return Ok(());
    }

    let desktop_bin =
        std::env::var_os("VELLUM_APP_BIN").unwrap_or_else(|| OsString::from("vellum"));

    let status =
        Command::new(desktop_bin).arg(file).status().context("failed to launch desktop app")?;

    if !status.success() {
        anyhow::bail!("desktop app exited with status {status}");
    }

    Ok(())
}

fn run_info(kind: EngineKind, file: &Path) -> Result<()> {
    ensure_file_exists(file)?;

    let payload = match kind {
        EngineKind::Pdfium => {
            let info = probe_file(file).context("failed to open document")?;
            InfoOutput {
                path: file.display().to_string(),
                page_count: info.page_count,
                page_sizes: info.page_sizes,
                title: info.title,
            }
        }
        EngineKind::Memory => {
            let mut engine = create_engine(kind)?;
            let handle = engine.open(OpenSource::from(file)).context("failed to open document")?;
            let page_count = engine.page_count(handle)?;
            let page_sizes = (0..page_count)
                .map(|page| engine.page_size(handle, page).map(|size| [size.width_pt, size.height_pt]))
                .collect::<Result<Vec<_>, _>>()?;
            engine.close(handle)?;

            InfoOutput { path: file.display().to_string(), page_count, page_sizes, title: None }
        }
    };

    print_json(&payload)
}

fn run_words(kind: EngineKind, file: &Path, page: u32) -> Result<()> {
    let editor = open_editor(kind, file, None)?;
    let index = page_index(&editor, page)?;
    let logical = editor.logical().context("document is not open")?;

    print_json(&WordsOutput { page, words: logical.page_words(index) })
}

fn run_search(kind: EngineKind, file: &Path, query: &str, case_sensitive: bool) -> Result<()> {
    let mut editor = open_editor(kind, file, None)?;
    let count = editor.search(query, case_sensitive)?;
    let hits = editor.search_hits().iter().map(HitOutput::from).collect();

    print_json(&SearchOutput { count, hits, query })
}

fn run_edit(
    kind: EngineKind,
    file: &Path,
    page: u32,
    word: &str,
    replacement: &str,
    occurrence: usize,
    output: Option<&Path>,
) -> Result<()> {
    if occurrence == 0 {
        anyhow::bail!("--occurrence is 1-based and must be >= 1");
    }

    let mut editor = open_editor(kind, file, None)?;
    let index = page_index(&editor, page)?;

    let target = editor
        .logical()
        .context("document is not open")?
        .page_words(index)
        .iter()
        .filter(|candidate| candidate.text == word)
        .nth(occurrence - 1)
        .cloned()
        .with_context(|| format!("word {word:?} (occurrence {occurrence}) not found on page {page}"))?;

    let outcome = editor.edit_word(index, &target, replacement)?;

    let output = output.unwrap_or(file);
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    editor
        .save_as(output)
        .with_context(|| format!("failed to save document to {}", output.display()))?;

    print_json(&EditOutput {
        page,
        removed: outcome.removed,
        inserted: outcome.inserted,
        font: outcome.font.postscript_name(),
        size: outcome.size,
        output: output.display().to_string(),
    })
}

fn run_extract_text(kind: EngineKind, file: &Path, page: u32, rect: &Rect) -> Result<()> {
    let editor = open_editor(kind, file, None)?;
    let index = page_index(&editor, page)?;
    let logical = editor.logical().context("document is not open")?;

    println!("{}", logical.text_in_region(index, rect));
    Ok(())
}

fn run_screenshot(
    kind: EngineKind,
    file: &Path,
    page: u32,
    rect: &Rect,
    scale: f32,
    output: &Path,
) -> Result<()> {
    let mut editor = open_editor(kind, file, Some(scale))?;
    let index = page_index(&editor, page)?;
    editor.goto_page(index + 1);
    editor.set_zoom_percent(100);

    let scene = editor.transform().rect_to_scene(rect);
    let image = editor.screenshot_scene_region(&scene)?;
    write_png(&image, output)
}

fn run_render(
    kind: EngineKind,
    file: &Path,
    page: u32,
    scale: f32,
    debug: bool,
    output: Option<&Path>,
) -> Result<()> {
    let mut editor = open_editor(kind, file, Some(scale))?;
    let index = page_index(&editor, page)?;
    editor.goto_page(index + 1);
    editor.set_zoom_percent(100);
    editor.toggle_debug(debug);

    let rendered = editor.render_current().context("failed to render page")?;
    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));
    write_png(&rendered.image, &output)
}

fn write_png(image: &pdf_engine::RgbaImage, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image
        .save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rect_accepts_four_numbers() {
        assert_eq!(parse_rect("10, 20,30.5,40"), Ok(Rect::new(10.0, 20.0, 30.5, 40.0)));
        assert_eq!(parse_rect("30,40,10,20"), Ok(Rect::new(10.0, 20.0, 30.0, 40.0)));
    }

    #[test]
    fn parse_rect_rejects_bad_input() {
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("1,2,three,4").is_err());
    }

    #[test]
    fn default_render_output_sits_next_to_input() {
        let out = default_render_output(Path::new("/docs/report.pdf"), 3);
        assert_eq!(out, PathBuf::from("/docs/report-page-3.png"));
    }
}
