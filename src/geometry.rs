// 📐 Connector Geometry - Where to draw each mapping between two columns
//
// The two account columns scroll independently and are overlaid on one
// drawing surface. For every mapping we resolve:
//   source point = right edge of the source row, vertical center
//   target point = left edge of the target row, vertical center
// with each y clamped to the visible span of its own column, so a row that
// is scrolled half out of view keeps its connector pinned to the column edge.
//
// The rendering host is reached only through LayoutProvider, which keeps the
// math testable without any UI.

use crate::accounts::Universe;
use crate::config::ConnectorPalette;
use crate::mapping::{Mapping, MappingType};
use serde::{Deserialize, Serialize};

// ============================================================================
// PRIMITIVES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned rectangle in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Rect {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    /// Vertical overlap only; columns clip vertically, not horizontally
    pub fn overlaps_vertically(&self, other: &Rect) -> bool {
        self.top < other.bottom() && self.bottom() > other.top
    }

    /// Pin `y` into [top, bottom]; tolerates degenerate rects
    pub fn clamp_y(&self, y: f64) -> f64 {
        y.max(self.top).min(self.bottom().max(self.top))
    }
}

// ============================================================================
// LAYOUT PROVIDER (rendering host capability)
// ============================================================================

/// Live measurements supplied by whatever renders the two columns
pub trait LayoutProvider {
    /// Rectangle of the rendered row for an account, `None` when the row is
    /// not rendered (filtered out by search, collapsed, ...)
    fn element_rect(&self, universe: Universe, account_number: &str) -> Option<Rect>;

    /// Visible (clipping) rectangle of a column
    fn column_viewport(&self, universe: Universe) -> Rect;

    /// Rectangle of the shared drawing surface; connector points are
    /// relative to its top-left corner
    fn surface_rect(&self) -> Rect;
}

// ============================================================================
// CURVE SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSettings {
    /// Control-point offset as a share of the horizontal span
    pub ratio: f64,

    /// Upper bound on the offset, in pixels
    pub cap: f64,
}

impl Default for CurveSettings {
    fn default() -> Self {
        CurveSettings {
            ratio: 0.4,
            cap: 100.0,
        }
    }
}

impl CurveSettings {
    /// min(ratio * |dx|, cap)
    pub fn control_offset(&self, dx: f64) -> f64 {
        (self.ratio * dx.abs()).min(self.cap)
    }
}

// ============================================================================
// CONNECTION LINE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionLine {
    /// Stable across recomputes: derived from the mapping id
    pub id: String,
    pub mapping_id: String,
    pub mapping_type: MappingType,
    pub source: Point,
    pub target: Point,
    pub is_selected: bool,
}

impl ConnectionLine {
    pub fn path(&self, curve: &CurveSettings) -> String {
        generate_line_path(self.source, self.target, curve)
    }

    pub fn style(&self, palette: &ConnectorPalette) -> LineStyle {
        resolve_style(self.mapping_type, self.is_selected, palette)
    }
}

pub fn connection_id(mapping_id: &str) -> String {
    format!("conn-{}", mapping_id)
}

/// Resolve every drawable connector for the current mappings and layout
///
/// Skipped silently: mappings with an endpoint that is not rendered, and
/// mappings with both endpoints scrolled out of view.
pub fn compute_connections<'a, L>(
    mappings: impl IntoIterator<Item = &'a Mapping>,
    selected_mapping_id: Option<&str>,
    layout: &L,
) -> Vec<ConnectionLine>
where
    L: LayoutProvider + ?Sized,
{
    let surface = layout.surface_rect();
    let source_viewport = layout.column_viewport(Universe::Source);
    let target_viewport = layout.column_viewport(Universe::Target);

    let mut lines = Vec::new();
    for mapping in mappings {
        let Some(source_rect) = layout.element_rect(Universe::Source, &mapping.source_account_number) else {
            continue;
        };
        let Some(target_rect) = layout.element_rect(Universe::Target, &mapping.target_account_number) else {
            continue;
        };

        let source_visible = source_rect.overlaps_vertically(&source_viewport);
        let target_visible = target_rect.overlaps_vertically(&target_viewport);
        if !source_visible && !target_visible {
            continue;
        }

        let source = Point::new(
            source_rect.right() - surface.left,
            source_viewport.clamp_y(source_rect.center_y()) - surface.top,
        );
        let target = Point::new(
            target_rect.left - surface.left,
            target_viewport.clamp_y(target_rect.center_y()) - surface.top,
        );

        lines.push(ConnectionLine {
            id: connection_id(&mapping.mapping_id),
            mapping_id: mapping.mapping_id.clone(),
            mapping_type: mapping.mapping_type,
            source,
            target,
            is_selected: selected_mapping_id == Some(mapping.mapping_id.as_str()),
        });
    }
    lines
}

/// Cubic S-curve from `source` to `target`
///
/// Control points sit horizontally off each endpoint by
/// `min(ratio * |dx|, cap)`, so long vertical spans do not overshoot.
pub fn generate_line_path(source: Point, target: Point, curve: &CurveSettings) -> String {
    let offset = curve.control_offset(target.x - source.x);
    format!(
        "M {} {} C {} {}, {} {}, {} {}",
        source.x,
        source.y,
        source.x + offset,
        source.y,
        target.x - offset,
        target.y,
        target.x,
        target.y
    )
}

// ============================================================================
// LINE STYLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStyle {
    pub stroke: String,
    pub stroke_width: f64,
}

pub fn resolve_style(mapping_type: MappingType, is_selected: bool, palette: &ConnectorPalette) -> LineStyle {
    if is_selected {
        LineStyle {
            stroke: palette.selected.clone(),
            stroke_width: palette.selected_stroke_width,
        }
    } else {
        LineStyle {
            stroke: palette.color_for(mapping_type).to_string(),
            stroke_width: palette.stroke_width,
        }
    }
}

// ============================================================================
// ROW LAYOUT (fixed-height rows, for hosts without live measurement)
// ============================================================================

/// Two scrollable columns of fixed-height rows over one surface
///
/// Each column lists the account numbers currently rendered (after any
/// search/filter), top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowLayout {
    pub surface: Rect,
    pub source_column: Rect,
    pub target_column: Rect,
    pub row_height: f64,
    pub source_rows: Vec<String>,
    pub target_rows: Vec<String>,
    #[serde(default)]
    pub source_scroll: f64,
    #[serde(default)]
    pub target_scroll: f64,
}

impl RowLayout {
    pub fn scroll_to(&mut self, universe: Universe, offset: f64) {
        let offset = offset.max(0.0);
        match universe {
            Universe::Source => self.source_scroll = offset,
            Universe::Target => self.target_scroll = offset,
        }
    }

    pub fn resize_column(&mut self, universe: Universe, height: f64) {
        match universe {
            Universe::Source => self.source_column.height = height,
            Universe::Target => self.target_column.height = height,
        }
    }

    fn column(&self, universe: Universe) -> (&Rect, &[String], f64) {
        match universe {
            Universe::Source => (&self.source_column, self.source_rows.as_slice(), self.source_scroll),
            Universe::Target => (&self.target_column, self.target_rows.as_slice(), self.target_scroll),
        }
    }
}

impl LayoutProvider for RowLayout {
    fn element_rect(&self, universe: Universe, account_number: &str) -> Option<Rect> {
        let (column, rows, scroll) = self.column(universe);
        let index = rows.iter().position(|n| n == account_number)?;
        Some(Rect::new(
            column.left,
            column.top + index as f64 * self.row_height - scroll,
            column.width,
            self.row_height,
        ))
    }

    fn column_viewport(&self, universe: Universe) -> Rect {
        *self.column(universe).0
    }

    fn surface_rect(&self) -> Rect {
        self.surface
    }
}

// ============================================================================
// TESTS
// ============================================================================
