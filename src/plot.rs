use std::{fs, path::Path};

use crate::{
    error::{IoContext, Result},
    history::TrainingHistory,
    metrics::ConfusionMatrix,
};

const PANEL_W: f32 = 400.;
const PANEL_H: f32 = 320.;
const MARGIN: f32 = 40.;
const TRAIN_COLOR: &str = "blue";
const VAL_COLOR: &str = "red";

/// The best values written over the curves once training is over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveAnnotations {
    /// The epoch training stopped at, drawn as a vertical marker.
    pub final_epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub train_acc: f32,
    pub val_acc: f32,
}

/// Draws the loss and accuracy curves of `history` side by side, train in blue and validation
/// in red, and writes them to `path` as an SVG image.
pub fn draw_curve(
    history: &TrainingHistory,
    annotations: Option<&CurveAnnotations>,
    path: &Path,
) -> Result<()> {
    let xs: Vec<f32> = history.epochs().iter().map(|&e| e as f32).collect();
    let final_epoch = annotations.map(|a| a.final_epoch as f32);

    let mut svg = open_svg(2. * PANEL_W, PANEL_H);
    svg.push_str(&panel(
        0.,
        "loss",
        &xs,
        [history.train_loss(), history.val_loss()],
        final_epoch,
        annotations.map(|a| (a.train_loss, a.val_loss)),
    ));
    svg.push_str(&panel(
        PANEL_W,
        "top1err",
        &xs,
        [history.train_acc(), history.val_acc()],
        final_epoch,
        annotations.map(|a| (a.train_acc, a.val_acc)),
    ));
    svg.push_str("</svg>\n");

    write_svg(path, &svg)
}

/// Draws `cm` as a 2x2 heat-map with its counts and writes it to `path` as an SVG image.
pub fn draw_confusion_matrix(cm: &ConfusionMatrix, title: &str, path: &Path) -> Result<()> {
    let cell = 120.;
    let size = 2. * cell + 2. * MARGIN;
    let max = (0..2)
        .flat_map(|t| (0..2).map(move |p| (t, p)))
        .map(|(t, p)| cm.get(t, p))
        .max()
        .unwrap_or_default()
        .max(1);

    let mut svg = open_svg(size, size);
    svg.push_str(&text(size / 2., MARGIN / 2., title, "middle"));

    for truth in 0..2 {
        for pred in 0..2 {
            let count = cm.get(truth, pred);
            let x = MARGIN + pred as f32 * cell;
            let y = MARGIN + truth as f32 * cell;
            let shade = 255 - (count * 200 / max) as u8;

            svg.push_str(&format!(
                "<rect x=\"{x}\" y=\"{y}\" width=\"{cell}\" height=\"{cell}\" \
                 fill=\"rgb({shade},{shade},255)\" stroke=\"black\"/>\n"
            ));
            let (cx, cy) = (x + cell / 2., y + cell / 2.);
            svg.push_str(&text(cx, cy, &count.to_string(), "middle"));
        }
    }

    for label in 0..2 {
        let offset = MARGIN + (label as f32 + 0.5) * cell;
        let label = label.to_string();
        svg.push_str(&text(offset, size - MARGIN / 3., &label, "middle"));
        svg.push_str(&text(MARGIN / 2., offset, &label, "middle"));
    }
    svg.push_str(&text(size / 2., size - 2., "Predicted label", "middle"));
    svg.push_str("</svg>\n");

    write_svg(path, &svg)
}

fn open_svg(width: f32, height: f32) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         font-family=\"sans-serif\" font-size=\"12\">\n\
         <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n"
    )
}

fn text(x: f32, y: f32, content: &str, anchor: &str) -> String {
    format!("<text x=\"{x}\" y=\"{y}\" text-anchor=\"{anchor}\">{content}</text>\n")
}

fn panel(
    left: f32,
    title: &str,
    xs: &[f32],
    series: [&[f32]; 2],
    final_epoch: Option<f32>,
    notes: Option<(f32, f32)>,
) -> String {
    let (x0, x1) = bounds(xs.iter().copied().chain(final_epoch));
    let (y0, y1) = bounds(series.iter().flat_map(|s| s.iter().copied()));

    let (w, h) = (PANEL_W - 2. * MARGIN, PANEL_H - 2. * MARGIN);
    let sx = |x: f32| left + MARGIN + (x - x0) / (x1 - x0) * w;
    let sy = |y: f32| MARGIN + (y1 - y) / (y1 - y0) * h;

    let mut out = text(left + PANEL_W / 2., MARGIN / 2., title, "middle");
    out.push_str(&format!(
        "<rect x=\"{}\" y=\"{MARGIN}\" width=\"{w}\" height=\"{h}\" fill=\"none\" stroke=\"black\"/>\n",
        left + MARGIN
    ));
    let tick_x = left + MARGIN - 4.;
    out.push_str(&text(tick_x, MARGIN + h, &format!("{y0:.3}"), "end"));
    out.push_str(&text(tick_x, MARGIN + 10., &format!("{y1:.3}"), "end"));

    for (values, (color, label)) in series
        .iter()
        .zip([(TRAIN_COLOR, "train"), (VAL_COLOR, "val")])
    {
        let points: Vec<(f32, f32)> = xs
            .iter()
            .zip(values.iter())
            .filter(|(_, y)| y.is_finite())
            .map(|(&x, &y)| (sx(x), sy(y)))
            .collect();

        let line = points
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "<polyline points=\"{line}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"1\"/>\n"
        ));
        for (x, y) in &points {
            out.push_str(&format!(
                "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"2\" fill=\"{color}\"/>\n"
            ));
        }

        let legend_y = MARGIN + 14. + if label == "train" { 0. } else { 14. };
        out.push_str(&format!(
            "<text x=\"{}\" y=\"{legend_y}\" fill=\"{color}\">{label}</text>\n",
            left + PANEL_W - MARGIN - 40.
        ));
    }

    if let Some(epoch) = final_epoch {
        let x = sx(epoch);
        out.push_str(&format!(
            "<line x1=\"{x:.1}\" y1=\"{MARGIN}\" x2=\"{x:.1}\" y2=\"{}\" \
             stroke=\"gray\" stroke-dasharray=\"4 2\"/>\n",
            MARGIN + h
        ));
    }

    if let Some((train, val)) = notes {
        let cx = left + PANEL_W / 2.;
        out.push_str(&text(cx, MARGIN + 0.5 * h, &format!("T{train}"), "middle"));
        out.push_str(&text(cx, MARGIN + 0.8 * h, &format!("V{val}"), "middle"));
    }

    out
}

/// Returns the finite range of `values`, widened when it's a single point.
fn bounds(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if lo > hi {
        return (0., 1.);
    }

    if hi - lo < f32::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }

    (lo, hi)
}

fn write_svg(path: &Path, svg: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }

    fs::write(path, svg).at(path)
}
