//!
//! src/report.rs
//!
//! Terminal output for the artist pipeline: the first rows of the stored
//! table, then a scatter chart of duration against popularity shown on
//! the alternate screen until a key is pressed.
//!

use std::io::{self, IsTerminal};

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph},
};
use tabled::{Table, Tabled};
use tracing::{info, warn};

use crate::errors::ReportError;
use crate::normalize::ArtistTrackRecord;

#[derive(Tabled)]
pub struct ArtistHeadRow {
    pub track_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub release_date: String,
    pub popularity: String,
    pub duration_ms: String,
    pub duration_min: String,
}

fn cell<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl From<&ArtistTrackRecord> for ArtistHeadRow {
    fn from(r: &ArtistTrackRecord) -> Self {
        Self {
            track_id: cell(r.track_id.as_deref()),
            name: cell(r.name.as_deref()),
            artist: cell(r.artist.as_deref()),
            album: cell(r.album.as_deref()),
            release_date: cell(r.release_date),
            popularity: cell(r.popularity),
            duration_ms: cell(r.duration_ms),
            duration_min: cell(r.duration_min.map(|m| format!("{m:.2}"))),
        }
    }
}

/// First `n` rows rendered as a text table
pub fn head_table(rows: &[ArtistTrackRecord], n: usize) -> String {
    let head: Vec<ArtistHeadRow> = rows.iter().take(n).map(ArtistHeadRow::from).collect();
    Table::new(head).to_string()
}

#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            title: "Relationship between Duration and Popularity".to_string(),
            x_label: "Duration (minutes)".to_string(),
            y_label: "Popularity".to_string(),
        }
    }
}

/// (duration_min, popularity) for rows that have both
pub fn scatter_points(rows: &[ArtistTrackRecord]) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|r| Some((r.duration_min?, r.popularity? as f64)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect()
}

/// Axis range covering `values`; a lone value sits mid-axis
fn axis_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        [0.0, 1.0]
    } else if hi - lo < f64::EPSILON {
        [lo - 0.5, hi + 0.5]
    } else {
        [lo, hi]
    }
}

fn axis_labels(bounds: [f64; 2], decimals: usize) -> Vec<Span<'static>> {
    let [lo, hi] = bounds;
    [lo, (lo + hi) / 2.0, hi]
        .into_iter()
        .map(|v| Span::from(format!("{v:.decimals$}")))
        .collect()
}

/// Duration against popularity, drawn as a ratatui scatter chart
#[derive(Debug, Clone)]
pub struct ScatterPlot {
    points: Vec<(f64, f64)>,
    opts: PlotOptions,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

impl ScatterPlot {
    pub fn new(points: Vec<(f64, f64)>, opts: PlotOptions) -> Self {
        let x_bounds = axis_bounds(points.iter().map(|p| p.0));
        let y_bounds = axis_bounds(points.iter().map(|p| p.1));
        Self { points, opts, x_bounds, y_bounds }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        self.x_bounds
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        self.y_bounds
    }

    fn chart(&self) -> Chart<'_> {
        let dataset = Dataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Cyan))
            .data(&self.points);

        let title = Line::from(self.opts.title.as_str()).centered().bold();
        let axis_style = Style::default().fg(Color::Gray);

        Chart::new(vec![dataset])
            .block(Block::bordered().title(title))
            .x_axis(
                Axis::default()
                    .title(self.opts.x_label.as_str())
                    .style(axis_style)
                    .bounds(self.x_bounds)
                    .labels(axis_labels(self.x_bounds, 2)),
            )
            .y_axis(
                Axis::default()
                    .title(self.opts.y_label.as_str())
                    .style(axis_style)
                    .bounds(self.y_bounds)
                    .labels(axis_labels(self.y_bounds, 0)),
            )
    }

    pub fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),    // Chart
                Constraint::Length(1), // Help text
            ])
            .split(frame.area());

        frame.render_widget(self.chart(), chunks[0]);

        let help = Paragraph::new("Press any key to close")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[1]);
    }
}

/// Redraws until a key is pressed
fn wait_for_key<B: Backend>(terminal: &mut Terminal<B>, plot: &ScatterPlot) ->
    Result<(), ReportError> {
    loop {
        terminal.draw(|f| plot.draw(f))?;
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(());
            }
        }
    }
}

/// Shows `plot` on the alternate screen and restores the terminal afterwards
pub fn show_scatter(plot: &ScatterPlot) -> Result<(), ReportError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = wait_for_key(&mut terminal, plot);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Plots the reloaded artist rows; blocks until the viewer closes the chart
pub fn duration_popularity_plot(rows: &[ArtistTrackRecord]) -> Result<(), ReportError> {
    let points = scatter_points(rows);
    if points.is_empty() {
        warn!("report.plot.empty");
        println!("No tracks with both duration and popularity to plot.");
        return Ok(());
    }
    if !io::stdout().is_terminal() {
        info!(points = points.len(), "report.plot.skipped_not_a_terminal");
        return Ok(());
    }

    info!(points = points.len(), "report.plot.show");
    show_scatter(&ScatterPlot::new(points, PlotOptions::default()))
}
