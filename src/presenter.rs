//! Presenters for tally snapshots
//!
//! A [`Presenter`] is refreshed with the current snapshot after every
//! processed message and once more with the final snapshot when the loop
//! stops. Refreshes must return in bounded time; the driving loop does not
//! poll the source while a refresh is running.
//!
//! Two presenters ship with the crate:
//! - [`TextChart`] draws a horizontal bar chart to any `io::Write`
//! - [`LogPresenter`] emits the snapshot as a structured log line

use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

/// Errors raised while presenting a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("failed to write chart: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub label: String,
    pub value: u64,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Snapshot types that can be drawn as a bar chart.
pub trait ChartData {
    fn title(&self) -> String;
    fn x_label(&self) -> &'static str;
    fn y_label(&self) -> &'static str;
    fn bars(&self) -> Vec<Bar>;
}

/// Consumer of snapshots.
pub trait Presenter<S> {
    /// Redraw with the snapshot taken after the latest message.
    fn refresh(&mut self, snapshot: &S) -> Result<(), PresentError>;

    /// Final draw after the loop has stopped.
    fn finish(&mut self, _snapshot: &S) -> Result<(), PresentError> {
        Ok(())
    }
}

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const BAR_GLYPH: &str = "█";

/// Horizontal bar chart written to a text sink.
///
/// Bars are scaled so the largest value spans `width` glyphs. A non-zero
/// value always gets at least one glyph.
pub struct TextChart<W: Write> {
    out: W,
    width: usize,
    clear: bool,
    redraws: u64,
}

impl TextChart<io::Stdout> {
    /// Chart on stdout that clears the terminal between redraws.
    pub fn stdout(width: usize) -> Self {
        Self::new(io::stdout(), width).with_clear(true)
    }
}

impl<W: Write> TextChart<W> {
    pub fn new(out: W, width: usize) -> Self {
        Self {
            out,
            width: width.max(1),
            clear: false,
            redraws: 0,
        }
    }

    /// Clear the terminal before each redraw.
    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// Number of times the chart has been drawn.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Take back the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw<S: ChartData>(&mut self, snapshot: &S) -> Result<(), PresentError> {
        let bars = snapshot.bars();
        let rendered = render(snapshot, &bars, self.width);

        if self.clear {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(rendered.as_bytes())?;
        self.out.flush()?;
        self.redraws += 1;
        Ok(())
    }
}

impl<S: ChartData, W: Write> Presenter<S> for TextChart<W> {
    fn refresh(&mut self, snapshot: &S) -> Result<(), PresentError> {
        self.draw(snapshot)
    }

    fn finish(&mut self, snapshot: &S) -> Result<(), PresentError> {
        self.draw(snapshot)
    }
}

/// Render a snapshot into chart text.
pub fn render<S: ChartData>(snapshot: &S, bars: &[Bar], width: usize) -> String {
    let title = snapshot.title();
    let label_width = bars
        .iter()
        .map(|b| b.label.chars().count())
        .max()
        .unwrap_or(0)
        .max(snapshot.x_label().len());
    let max_value = bars.iter().map(|b| b.value).max().unwrap_or(0);

    let mut text = String::new();
    text.push_str(&title);
    text.push('\n');
    text.push_str(&"=".repeat(title.chars().count()));
    text.push('\n');
    text.push_str(&format!(
        "{:<label_width$} | {}\n",
        snapshot.x_label(),
        snapshot.y_label()
    ));

    if bars.is_empty() {
        text.push_str("(no data)\n");
        return text;
    }

    for bar in bars {
        let glyphs = scaled_length(bar.value, max_value, width);
        let fill = BAR_GLYPH.repeat(glyphs);
        let pad = label_width - bar.label.chars().count();
        text.push_str(&format!(
            "{}{} | {} {}\n",
            bar.label,
            " ".repeat(pad),
            fill,
            bar.value
        ));
    }
    text
}

fn scaled_length(value: u64, max_value: u64, width: usize) -> usize {
    if value == 0 || max_value == 0 {
        return 0;
    }
    let scaled = (value as u128 * width as u128 / max_value as u128) as usize;
    scaled.max(1)
}

/// Presenter that logs each snapshot instead of drawing it.
#[derive(Debug, Default)]
pub struct LogPresenter {
    refreshes: u64,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

impl<S: Serialize> Presenter<S> for LogPresenter {
    fn refresh(&mut self, snapshot: &S) -> Result<(), PresentError> {
        let json = serde_json::to_string(snapshot)?;
        self.refreshes += 1;
        info!(refresh = self.refreshes, snapshot = %json, "Tally snapshot");
        Ok(())
    }

    fn finish(&mut self, snapshot: &S) -> Result<(), PresentError> {
        let json = serde_json::to_string(snapshot)?;
        info!(snapshot = %json, "Final tally snapshot");
        Ok(())
    }
}
