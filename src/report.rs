use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::results::{CombinedResults, FoldResult, ModelKind, ModelOutcome};
use crate::runner::Report;

const CSV_HEADER: &str = "domain,real_label,prob,real_y";

const CSV_SUFFIX: &str = "-resultset.csv";

// RFC 4180 record terminator
const CSV_LINE_END: &str = "\r\n";

const FONT_FAMILY: &str = "sans-serif";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font registered with plotters for this process. Registration leaks the
/// font bytes, so it happens at most once.
static REGISTERED_FONT: Mutex<Option<PathBuf>> = Mutex::new(None);

// bmh palette
const PALETTE: [RGBColor; 2] = [RGBColor(52, 138, 189), RGBColor(166, 6, 40)];

pub fn csv_file_name(kind: ModelKind, fold_index: usize) -> String {
    format!("{}-{}{}", kind.name(), fold_index, CSV_SUFFIX)
}

/// Inverse of [`csv_file_name`]; `None` for any other file name.
fn parse_csv_file_name(name: &str) -> Option<(ModelKind, usize)> {
    let (model, index) = name.strip_suffix(CSV_SUFFIX)?.split_once('-')?;
    let kind = ModelKind::ALL.into_iter().find(|k| k.name() == model)?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((kind, index.parse().ok()?))
}

/// Writes one CSV per fold of every model that ran and removes result-set
/// files left in `dir` by earlier runs. Returns the files in the order they
/// were written.
pub fn dump_csv(results: &CombinedResults, dir: &Path) -> Result<Vec<PathBuf>> {
    let start_time = Instant::now();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let mut written = Vec::new();
    for (kind, outcome) in results.iter() {
        let folds = match outcome {
            ModelOutcome::Present(folds) => folds,
            ModelOutcome::Skipped => continue,
        };
        for (fold_index, fold) in folds.iter().enumerate() {
            let path = dir.join(csv_file_name(kind, fold_index));
            write_fold_csv(fold, &path)?;
            written.push(path);
        }
    }
    let removed = remove_stale_csv(dir, &written)?;

    info!(
        action = "complete",
        component = "csv_dump",
        files = written.len(),
        removed,
        duration_ms = start_time.elapsed().as_millis(),
        "Wrote per-fold result sets"
    );
    Ok(written)
}

/// Deletes `{model}-{n}-resultset.csv` files in `dir` that are not in
/// `keep`, such as folds of a skipped model or of a larger earlier run.
fn remove_stale_csv(dir: &Path, keep: &[PathBuf]) -> Result<usize> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))?;
    let mut removed = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if parse_csv_file_name(name).is_none() || keep.contains(&path) || !path.is_file() {
            continue;
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove stale {:?}", path))?;
        debug!(action = "remove", component = "csv_dump", path = ?path, "Removed stale result set");
        removed += 1;
    }
    Ok(removed)
}

fn write_fold_csv(fold: &FoldResult, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write!(writer, "{}{}", CSV_HEADER, CSV_LINE_END)
        .with_context(|| format!("Failed to write {:?}", path))?;
    for ((record, prob), y) in fold.records.iter().zip(&fold.probs).zip(&fold.y) {
        write!(
            writer,
            "{},{},{:?},{}{}",
            csv_field(record.domain()),
            csv_field(&record.label().to_string()),
            prob,
            y,
            CSV_LINE_END
        )
        .with_context(|| format!("Failed to write {:?}", path))?;
    }
    writer.flush().with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// A curve as it appears in the figure.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub kind: ModelKind,
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// One series per model that ran, LSTM first.
pub fn plot_series(report: &Report) -> Vec<PlotSeries> {
    [ModelKind::Lstm, ModelKind::Bigram]
        .into_iter()
        .filter_map(|kind| {
            report.get(kind).map(|m| PlotSeries {
                kind,
                label: format!("{} (AUC = {:.4})", kind.display_name(), m.auc),
                points: m
                    .curve
                    .fpr
                    .iter()
                    .copied()
                    .zip(m.curve.tpr.iter().copied())
                    .collect(),
            })
        })
        .collect()
}

/// Registers a TrueType font for figure text. Returns `false` when no font
/// was configured and none of the usual system fonts exist. Once a font is
/// registered, later calls reuse it.
fn load_font(explicit: Option<&Path>) -> Result<bool> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(anyhow!("Failed to read font {:?}: not a file", path));
            }
            path.to_path_buf()
        }
        None => match FONT_CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists()) {
            Some(path) => path,
            None => return Ok(false),
        },
    };

    let mut registered = REGISTERED_FONT
        .lock()
        .map_err(|_| anyhow!("Font registration lock is poisoned"))?;
    if let Some(current) = registered.as_ref() {
        if *current != path {
            debug!(
                action = "load",
                component = "plot_font",
                requested = ?path,
                current = ?current,
                "A figure font is already registered; keeping it"
            );
        }
        return Ok(true);
    }

    let bytes = fs::read(&path).with_context(|| format!("Failed to read font {:?}", path))?;
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(FONT_FAMILY, FontStyle::Normal, bytes)
        .map_err(|_| anyhow!("{:?} is not a usable TrueType font", path))?;
    info!(action = "load", component = "plot_font", path = ?path, "Registered figure font");
    *registered = Some(path);
    Ok(true)
}

/// Draws the macro ROC curves into a PNG at `path`.
pub fn render(series: &[PlotSeries], path: &Path, font: Option<&Path>) -> Result<()> {
    let start_time = Instant::now();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }

    let with_text = load_font(font)?;
    if !with_text {
        warn!(
            action = "load",
            component = "plot_font",
            "No TrueType font found; the figure is drawn without text (set PLOT_FONT)"
        );
    }

    draw_figure(series, path, with_text)
        .map_err(|e| anyhow!("Failed to render {:?}: {}", path, e))?;

    info!(
        action = "complete",
        component = "figure",
        path = ?path,
        curves = series.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Figure saved"
    );
    Ok(())
}

fn draw_figure(
    series: &[PlotSeries],
    path: &Path,
    with_text: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(25);
    if with_text {
        builder
            .caption("ROC - Binary Classification", (FONT_FAMILY, 32))
            .x_label_area_size(60)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d(0.0..1.0, 0.0..1.05)?;

    if with_text {
        chart
            .configure_mesh()
            .x_desc("False Positive Rate")
            .y_desc("True Positive Rate")
            .axis_desc_style((FONT_FAMILY, 24))
            .label_style((FONT_FAMILY, 18))
            .draw()?;
    }

    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let anno = chart.draw_series(LineSeries::new(
            s.points.iter().copied(),
            color.stroke_width(2),
        ))?;
        if with_text {
            anno.label(s.label.as_str()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        }
    }

    if with_text && !series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((FONT_FAMILY, 20))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

pub fn print_summary(report: &Report) {
    println!("\n--- ROC - Binary Classification ---");
    if report.from_cache {
        println!("Results loaded from cache");
    }

    for kind in ModelKind::ALL {
        match report.get(kind) {
            Some(m) => {
                let fold_aucs = m
                    .fold_aucs
                    .iter()
                    .map(|auc| format!("{:.4}", auc))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "{}: macro AUC {:.4} over {} fold(s) [{}]",
                    kind.display_name(),
                    m.auc,
                    m.folds(),
                    fold_aucs
                );
            }
            None => println!("{}: skipped", kind.display_name()),
        }
    }

    println!("CSV files written: {}", report.csv_files.len());
}
