//! Annotation data model
//!
//! Every overlay item the editor draws above a page is an [`Annotation`]: plain
//! data made of a kind (with its content payload), page-space geometry and a
//! visual style. Rendering, hit-testing and export all dispatch on the kind;
//! nothing here knows about widgets.
//!
//! All coordinates are stored in page-local space of the *unrotated* page.

use crate::error::{EditorError, EditorResult};
use crate::fonts::StandardFont;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for an annotation
///
/// Stable across the session and written into saved files so reopening a
/// document restores the same ids.
pub type AnnotationId = uuid::Uuid;

/// Page-local coordinate in page space
///
/// - Origin (0, 0) at the top-left corner of the unrotated page
/// - X increases to the right
/// - Y increases downward
/// - Units are points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageCoordinate {
    pub x: f32,
    pub y: f32,
}

impl PageCoordinate {
    /// Create a new page coordinate
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another coordinate
    pub fn distance_to(&self, other: &PageCoordinate) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Rotate around `center` by `degrees`, clockwise as seen on screen.
    pub fn rotated_about(&self, center: &PageCoordinate, degrees: f32) -> Self {
        if degrees == 0.0 {
            return *self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Self::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
    }
}

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn grey(level: u8) -> Self {
        Self::rgb(level, level, level)
    }

    pub fn from_array(rgba: [u8; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Opaque color from PDF-style components in 0.0..=1.0
    pub fn from_unit_rgb(r: f32, g: f32, b: f32) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgb(channel(r), channel(g), channel(b))
    }

    /// Convert to normalized RGBA values (0.0 to 1.0)
    pub fn to_normalized(&self) -> (f32, f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }
}

/// Common annotation colors
impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const LINK_BLUE: Color = Color { r: 0, g: 0, b: 200, a: 255 };
    pub const NOTE_YELLOW: Color = Color { r: 255, g: 230, b: 100, a: 255 };
}

/// Axis-aligned rectangle in page space (`y` is the top edge)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two arbitrary corners
    pub fn from_corners(a: PageCoordinate, b: PageCoordinate) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn centered(center: PageCoordinate, width: f32, height: f32) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> PageCoordinate {
        PageCoordinate::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn corners(&self) -> [PageCoordinate; 4] {
        [
            PageCoordinate::new(self.x, self.y),
            PageCoordinate::new(self.right(), self.y),
            PageCoordinate::new(self.right(), self.bottom()),
            PageCoordinate::new(self.x, self.bottom()),
        ]
    }

    pub fn contains(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        point.x >= self.x - tolerance
            && point.x <= self.right() + tolerance
            && point.y >= self.y - tolerance
            && point.y <= self.bottom() + tolerance
    }

    pub fn intersects(&self, other: &PageRect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &PageRect) -> PageRect {
        let (x, y) = (self.x.min(other.x), self.y.min(other.y));
        PageRect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Bounding box of this rectangle rotated around its center
    pub fn rotated_bounds(&self, degrees: f32) -> PageRect {
        if degrees == 0.0 {
            return *self;
        }
        let center = self.center();
        let corners = self.corners().map(|c| c.rotated_about(&center, degrees));
        bounds_of(&corners).unwrap_or(*self)
    }

    /// Moves the rectangle inside `width` x `height`, shrinking it only when
    /// it is larger than the page.
    pub fn clamped_into(&self, width: f32, height: f32) -> PageRect {
        let w = self.width.min(width);
        let h = self.height.min(height);
        PageRect::new(self.x.clamp(0.0, width - w), self.y.clamp(0.0, height - h), w, h)
    }
}

fn bounds_of(points: &[PageCoordinate]) -> Option<PageRect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(PageRect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Annotation geometry in page space
///
/// Geometry is replaced wholesale on edits: moving or resizing an item creates
/// a new geometry and a `ModifyAnnotation` command carrying both versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AnnotationGeometry {
    /// Rectangle defined by two corners
    Rectangle {
        top_left: PageCoordinate,
        bottom_right: PageCoordinate,
    },

    /// Freehand drawing path
    Freehand { points: Vec<PageCoordinate> },
}

impl AnnotationGeometry {
    /// Rectangle from a [`PageRect`]
    pub fn rect(rect: PageRect) -> Self {
        AnnotationGeometry::Rectangle {
            top_left: PageCoordinate::new(rect.x, rect.y),
            bottom_right: PageCoordinate::new(rect.right(), rect.bottom()),
        }
    }

    /// Get the axis-aligned bounding box in page coordinates
    pub fn bounding_box(&self) -> PageRect {
        match self {
            AnnotationGeometry::Rectangle { top_left, bottom_right } => {
                PageRect::from_corners(*top_left, *bottom_right)
            }
            AnnotationGeometry::Freehand { points } => {
                bounds_of(points).unwrap_or(PageRect::new(0.0, 0.0, 0.0, 0.0))
            }
        }
    }

    /// Check if a point is within `tolerance` of this geometry
    ///
    /// Rectangles hit anywhere inside; freehand strokes hit near any segment.
    pub fn contains_point(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        match self {
            AnnotationGeometry::Rectangle { .. } => self.bounding_box().contains(point, tolerance),
            AnnotationGeometry::Freehand { points } => match points.as_slice() {
                [] => false,
                [only] => only.distance_to(point) <= tolerance,
                _ => points
                    .windows(2)
                    .any(|pair| point_near_line_segment(point, &pair[0], &pair[1], tolerance)),
            },
        }
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        match self {
            AnnotationGeometry::Rectangle { top_left, bottom_right } => {
                AnnotationGeometry::Rectangle {
                    top_left: top_left.translated(dx, dy),
                    bottom_right: bottom_right.translated(dx, dy),
                }
            }
            AnnotationGeometry::Freehand { points } => AnnotationGeometry::Freehand {
                points: points.iter().map(|p| p.translated(dx, dy)).collect(),
            },
        }
    }

    /// Clamp into a page of the given size
    ///
    /// Rectangles are moved back inside (shrunk only if larger than the
    /// page); stroke points are clamped one by one.
    pub fn clamped(&self, page_width: f32, page_height: f32) -> Self {
        match self {
            AnnotationGeometry::Rectangle { .. } => {
                AnnotationGeometry::rect(self.bounding_box().clamped_into(page_width, page_height))
            }
            AnnotationGeometry::Freehand { points } => AnnotationGeometry::Freehand {
                points: points
                    .iter()
                    .map(|p| {
                        PageCoordinate::new(p.x.clamp(0.0, page_width), p.y.clamp(0.0, page_height))
                    })
                    .collect(),
            },
        }
    }
}

/// Check if a point is near a line segment (within tolerance)
fn point_near_line_segment(
    point: &PageCoordinate,
    start: &PageCoordinate,
    end: &PageCoordinate,
    tolerance: f32,
) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_squared = dx * dx + dy * dy;

    if length_squared == 0.0 {
        return point.distance_to(start) <= tolerance;
    }

    // Project point onto the segment and clamp to its extent
    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_squared).clamp(0.0, 1.0);
    let closest = PageCoordinate::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// Decoded raster image carried by stamp, signature, image and watermark items
///
/// Pixels are straight (non-premultiplied) RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
}

impl ImagePayload {
    /// Decode a PNG/JPEG/BMP/GIF/WebP file
    ///
    /// Anything the decoder rejects is [`EditorError::UnsupportedImage`].
    pub fn from_path(path: &Path) -> EditorResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&path.display().to_string(), &bytes)
    }

    pub fn from_bytes(name: &str, bytes: &[u8]) -> EditorResult<Self> {
        let decoded = image::load_from_memory(bytes).map_err(|err| {
            EditorError::UnsupportedImage { name: name.to_owned(), reason: err.to_string() }
        })?;
        Ok(Self::from_rgba_image(decoded.to_rgba8()))
    }

    pub fn from_rgba_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height, rgba: Arc::new(image.into_raw()) }
    }

    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba.as_ref().clone())
    }

    /// Whether any pixel is not fully opaque
    pub fn has_alpha(&self) -> bool {
        self.rgba.chunks_exact(4).any(|px| px[3] != 255)
    }

    /// Image size in points at 72 dpi, scaled down so neither side exceeds
    /// `max_side`.
    pub fn fitted_size(&self, max_side: f32) -> (f32, f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        let longest = w.max(h);
        if longest <= max_side || longest == 0.0 {
            (w, h)
        } else {
            let scale = max_side / longest;
            (w * scale, h * scale)
        }
    }
}

/// Content of a stamp or watermark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkContent {
    Text(String),
    Image(ImagePayload),
}

/// Destination of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Uri(String),
    /// 0-based display index of the target page
    Page(u16),
}

/// Which generated page text an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTextRole {
    PageNumber,
    Header,
    Footer,
}

/// What an annotation is, with its content payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Freehand,
    Highlight,
    StickyNote { text: String },
    FreeText { text: String },
    Rectangle,
    Stamp { mark: MarkContent },
    Signature { image: ImagePayload },
    Image { image: ImagePayload },
    Watermark { mark: MarkContent },
    Link { target: LinkTarget },
    /// White cover over existing page text with the replacement drawn on top
    TextEdit { original: String, replacement: String },
    PageText { text: String, role: PageTextRole },
}

impl AnnotationKind {
    /// Stable machine name, also written as `/EditorKind` on export.
    pub fn type_name(&self) -> &'static str {
        match self {
            AnnotationKind::Freehand => "freehand",
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::StickyNote { .. } => "sticky_note",
            AnnotationKind::FreeText { .. } => "free_text",
            AnnotationKind::Rectangle => "rectangle",
            AnnotationKind::Stamp { .. } => "stamp",
            AnnotationKind::Signature { .. } => "signature",
            AnnotationKind::Image { .. } => "image",
            AnnotationKind::Watermark { .. } => "watermark",
            AnnotationKind::Link { .. } => "link",
            AnnotationKind::TextEdit { .. } => "text_edit",
            AnnotationKind::PageText { role: PageTextRole::PageNumber, .. } => "page_number",
            AnnotationKind::PageText { role: PageTextRole::Header, .. } => "header",
            AnnotationKind::PageText { role: PageTextRole::Footer, .. } => "footer",
        }
    }

    /// Human readable name for menus and undo labels
    pub fn label(&self) -> &'static str {
        match self {
            AnnotationKind::Freehand => "Freehand",
            AnnotationKind::Highlight => "Highlight",
            AnnotationKind::StickyNote { .. } => "Note",
            AnnotationKind::FreeText { .. } => "Text",
            AnnotationKind::Rectangle => "Rectangle",
            AnnotationKind::Stamp { .. } => "Stamp",
            AnnotationKind::Signature { .. } => "Signature",
            AnnotationKind::Image { .. } => "Image",
            AnnotationKind::Watermark { .. } => "Watermark",
            AnnotationKind::Link { .. } => "Link",
            AnnotationKind::TextEdit { .. } => "Text Edit",
            AnnotationKind::PageText { role: PageTextRole::PageNumber, .. } => "Page Number",
            AnnotationKind::PageText { role: PageTextRole::Header, .. } => "Header",
            AnnotationKind::PageText { role: PageTextRole::Footer, .. } => "Footer",
        }
    }

    /// Editable text, for kinds that carry any
    pub fn text(&self) -> Option<&str> {
        match self {
            AnnotationKind::StickyNote { text }
            | AnnotationKind::FreeText { text }
            | AnnotationKind::PageText { text, .. } => Some(text),
            AnnotationKind::TextEdit { replacement, .. } => Some(replacement),
            AnnotationKind::Stamp { mark: MarkContent::Text(text) }
            | AnnotationKind::Watermark { mark: MarkContent::Text(text) } => Some(text),
            _ => None,
        }
    }

    /// Copy of this kind with its text replaced; `None` for kinds without text
    pub fn with_text(&self, new_text: String) -> Option<Self> {
        let kind = match self {
            AnnotationKind::StickyNote { .. } => AnnotationKind::StickyNote { text: new_text },
            AnnotationKind::FreeText { .. } => AnnotationKind::FreeText { text: new_text },
            AnnotationKind::PageText { role, .. } => {
                AnnotationKind::PageText { text: new_text, role: *role }
            }
            AnnotationKind::TextEdit { original, .. } => {
                AnnotationKind::TextEdit { original: original.clone(), replacement: new_text }
            }
            AnnotationKind::Stamp { mark: MarkContent::Text(_) } => {
                AnnotationKind::Stamp { mark: MarkContent::Text(new_text) }
            }
            AnnotationKind::Watermark { mark: MarkContent::Text(_) } => {
                AnnotationKind::Watermark { mark: MarkContent::Text(new_text) }
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Raster payload, for image-bearing kinds
    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            AnnotationKind::Signature { image } | AnnotationKind::Image { image } => Some(image),
            AnnotationKind::Stamp { mark: MarkContent::Image(image) }
            | AnnotationKind::Watermark { mark: MarkContent::Image(image) } => Some(image),
            _ => None,
        }
    }
}

/// Editable annotation metadata
///
/// Can be modified without affecting geometry or appearance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationMetadata {
    /// User-facing label (shown in the annotation list)
    pub label: Option<String>,

    /// Author shown on sticky notes
    pub author: Option<String>,

    /// Creation timestamp, seconds since the Unix epoch
    pub created_at: u64,

    /// Last modification timestamp, seconds since the Unix epoch
    pub modified_at: u64,
}

impl AnnotationMetadata {
    /// Create new metadata stamped with the current time
    pub fn new() -> Self {
        let now = unix_now();
        Self { label: None, author: None, created_at: now, modified_at: now }
    }

    /// Update modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = unix_now().max(self.modified_at);
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Visual style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    /// Stroke color, also used for text
    pub stroke_color: Color,

    /// Stroke width in points
    pub stroke_width: f32,

    /// Fill color (None for no fill)
    pub fill_color: Option<Color>,

    /// Opacity (0.0 = transparent, 1.0 = opaque)
    pub opacity: f32,

    /// Font size for text-bearing kinds
    pub font_size: f32,

    pub font: StandardFont,

    /// Rotation around the geometry center in degrees, clockwise on screen
    pub rotation: f32,
}

impl AnnotationStyle {
    /// Create default style (black stroke, 2pt width, no fill)
    pub fn new() -> Self {
        Self {
            stroke_color: Color::BLACK,
            stroke_width: 2.0,
            fill_color: None,
            opacity: 1.0,
            font_size: 12.0,
            font: StandardFont::Helvetica,
            rotation: 0.0,
        }
    }

    /// Create style with red stroke (common for markups)
    pub fn red_markup() -> Self {
        Self { stroke_color: Color::RED, ..Self::new() }
    }

    /// Create style with yellow highlight fill
    pub fn yellow_highlight() -> Self {
        Self {
            stroke_color: Color::YELLOW,
            stroke_width: 0.0,
            fill_color: Some(Color::new(255, 255, 0, 80)),
            ..Self::new()
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete annotation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Stable unique identifier
    id: AnnotationId,

    /// Display index of the page this annotation belongs to (0-based)
    page_index: u16,

    kind: AnnotationKind,

    /// Geometry (replace via `with_geometry`)
    geometry: Arc<AnnotationGeometry>,

    /// Visual style (replace via `with_style`)
    style: Arc<AnnotationStyle>,

    /// Editable metadata (can be changed without affecting rendering)
    #[serde(default)]
    metadata: AnnotationMetadata,

    /// Whether this annotation is currently visible
    visible: bool,

    /// Layer/z-index for rendering order (higher = on top)
    layer: u32,
}

impl Annotation {
    /// Create a new annotation with generated ID
    pub fn new(
        page_index: u16,
        kind: AnnotationKind,
        geometry: AnnotationGeometry,
        style: AnnotationStyle,
    ) -> Self {
        Self::with_id(AnnotationId::new_v4(), page_index, kind, geometry, style)
    }

    /// Create a new annotation with specific ID (for import)
    pub fn with_id(
        id: AnnotationId,
        page_index: u16,
        kind: AnnotationKind,
        geometry: AnnotationGeometry,
        style: AnnotationStyle,
    ) -> Self {
        Self {
            id,
            page_index,
            kind,
            geometry: Arc::new(geometry),
            style: Arc::new(style),
            metadata: AnnotationMetadata::new(),
            visible: true,
            layer: 0,
        }
    }

    /// Get the annotation ID
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// Get the page index
    pub fn page_index(&self) -> u16 {
        self.page_index
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    /// Get the geometry (immutable reference)
    pub fn geometry(&self) -> &AnnotationGeometry {
        &self.geometry
    }

    /// Get the style (immutable reference)
    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Get the metadata
    pub fn metadata(&self) -> &AnnotationMetadata {
        &self.metadata
    }

    /// Get mutable metadata reference
    pub fn metadata_mut(&mut self) -> &mut AnnotationMetadata {
        &mut self.metadata
    }

    /// Check if annotation is visible
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Set visibility
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Get the layer/z-index
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Set the layer/z-index
    pub fn set_layer(&mut self, layer: u32) {
        self.layer = layer;
    }

    pub(crate) fn set_page_index(&mut self, page_index: u16) {
        self.page_index = page_index;
    }

    pub(crate) fn set_kind(&mut self, kind: AnnotationKind) {
        self.kind = kind;
    }

    /// Axis-aligned bounding box of the unrotated geometry
    pub fn bounding_box(&self) -> PageRect {
        self.geometry.bounding_box()
    }

    /// Bounding box on the page after applying the style rotation
    pub fn visual_bounds(&self) -> PageRect {
        match self.geometry.as_ref() {
            AnnotationGeometry::Rectangle { .. } => {
                self.bounding_box().rotated_bounds(self.style.rotation)
            }
            AnnotationGeometry::Freehand { .. } => self.bounding_box(),
        }
    }

    /// Check if a point hits this annotation (for selection)
    ///
    /// Rotated rectangles are tested in their own frame.
    pub fn hit_test(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        if !self.visible {
            return false;
        }
        let local = match self.geometry.as_ref() {
            AnnotationGeometry::Rectangle { .. } if self.style.rotation != 0.0 => {
                point.rotated_about(&self.bounding_box().center(), -self.style.rotation)
            }
            _ => *point,
        };
        self.geometry.contains_point(&local, tolerance)
    }

    /// Create a modified copy with new geometry (preserves ID and metadata)
    pub fn with_geometry(&self, geometry: AnnotationGeometry) -> Self {
        let mut new_annotation = self.clone();
        new_annotation.geometry = Arc::new(geometry);
        new_annotation.metadata.touch();
        new_annotation
    }

    /// Create a modified copy with new style (preserves ID and metadata)
    pub fn with_style(&self, style: AnnotationStyle) -> Self {
        let mut new_annotation = self.clone();
        new_annotation.style = Arc::new(style);
        new_annotation.metadata.touch();
        new_annotation
    }

    /// Create a modified copy with new content (preserves ID and metadata)
    pub fn with_kind(&self, kind: AnnotationKind) -> Self {
        let mut new_annotation = self.clone();
        new_annotation.kind = kind;
        new_annotation.metadata.touch();
        new_annotation
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        self.metadata.author = (!author.is_empty()).then_some(author);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.metadata.label = Some(label.into());
        self
    }
}

/// Collection of annotations for a document
///
/// Manages annotations across all pages with lookup by id and per-page
/// ordering for rendering.
#[derive(Debug, Clone, Default)]
pub struct AnnotationCollection {
    /// All annotations indexed by ID
    annotations: HashMap<AnnotationId, Annotation>,

    /// Annotations organized by page for efficient page rendering
    by_page: HashMap<u16, Vec<AnnotationId>>,
}

impl AnnotationCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation to the collection, replacing any with the same id
    pub fn add(&mut self, annotation: Annotation) {
        let id = annotation.id();
        self.remove(id);
        self.by_page.entry(annotation.page_index()).or_default().push(id);
        self.annotations.insert(id, annotation);
    }

    /// Remove an annotation by ID
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let annotation = self.annotations.remove(&id)?;
        let page_index = annotation.page_index();
        if let Some(page_annotations) = self.by_page.get_mut(&page_index) {
            page_annotations.retain(|&aid| aid != id);
            if page_annotations.is_empty() {
                self.by_page.remove(&page_index);
            }
        }
        Some(annotation)
    }

    /// Get an annotation by ID
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.annotations.contains_key(&id)
    }

    /// Get all annotations for a specific page, bottom layer first
    pub fn get_page_annotations(&self, page_index: u16) -> Vec<&Annotation> {
        let mut annotations: Vec<&Annotation> = self
            .by_page
            .get(&page_index)
            .map(|ids| ids.iter().filter_map(|id| self.annotations.get(id)).collect())
            .unwrap_or_default();

        annotations.sort_by_key(|a| (a.layer(), a.id()));
        annotations
    }

    /// Every annotation ordered by page, then layer
    pub fn all(&self) -> Vec<&Annotation> {
        let mut all: Vec<&Annotation> = self.annotations.values().collect();
        all.sort_by_key(|a| (a.page_index(), a.layer(), a.id()));
        all
    }

    /// Annotations matching `predicate`, ordered like [`Self::all`]
    pub fn filter(&self, predicate: impl Fn(&Annotation) -> bool) -> Vec<&Annotation> {
        self.all().into_iter().filter(|a| predicate(a)).collect()
    }

    /// Layer one above the current topmost
    pub fn next_layer(&self) -> u32 {
        self.annotations.values().map(|a| a.layer() + 1).max().unwrap_or(0)
    }

    /// Get count of annotations
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Check if collection is empty
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Clear all annotations
    pub fn clear(&mut self) {
        self.annotations.clear();
        self.by_page.clear();
    }

    /// Rewrite page indices (owner pages and page link targets) after the
    /// page list changed.
    pub(crate) fn remap_pages(&mut self, map: impl Fn(u16) -> u16) {
        let annotations: Vec<Annotation> = self.annotations.drain().map(|(_, a)| a).collect();
        self.by_page.clear();
        for mut annotation in annotations {
            annotation.set_page_index(map(annotation.page_index()));
            if let AnnotationKind::Link { target: LinkTarget::Page(page) } = annotation.kind {
                annotation.kind = AnnotationKind::Link { target: LinkTarget::Page(map(page)) };
            }
            self.add(annotation);
        }
    }

    /// Hit test to find annotations at a point on a page
    ///
    /// Returns annotations sorted by layer (top to bottom), so the first
    /// result is the topmost annotation at the point.
    pub fn hit_test(
        &self,
        page_index: u16,
        point: &PageCoordinate,
        tolerance: f32,
    ) -> Vec<&Annotation> {
        let mut hits: Vec<&Annotation> = self
            .get_page_annotations(page_index)
            .into_iter()
            .filter(|a| a.hit_test(point, tolerance))
            .collect();
        hits.reverse();
        hits
    }
}

impl PartialEq for AnnotationCollection {
    fn eq(&self, other: &Self) -> bool {
        self.annotations == other.annotations
    }
}
