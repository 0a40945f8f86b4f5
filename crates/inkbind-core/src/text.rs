//! Bound text labels.
//!
//! A container (rectangle, diamond, ellipse or arrow) can host one text
//! layer. The label is wrapped to the container's usable width, the
//! container grows when the label does not fit, and the label is kept
//! centered (or aligned) inside it.

use crate::layer::{Layer, LayerId, LayerKind, TextAlign, VerticalAlign};
use crate::linear_editor::{point_global, segment_mid_point};
use crate::mutation::LayerUpdate;
use crate::scene::Scene;
use crate::transform::TransformHandle;
use kurbo::{Point, Size, Vec2};
use std::f64::consts::SQRT_2;

/// Space between a container's border and its label.
pub const BOUND_TEXT_PADDING: f64 = 5.0;
/// Smallest font size a resize may produce.
pub const MIN_FONT_SIZE: f64 = 1.0;
/// Average glyph advance as a fraction of the font size.
pub const APPROX_CHAR_WIDTH: f64 = 0.55;

/// Measures laid-out text.
pub trait TextMeasurer {
    /// Advance width of a single line.
    fn line_width(&self, line: &str, font_size: f64) -> f64;

    /// Size of a multi-line block.
    fn measure(&self, text: &str, font_size: f64, line_height: f64) -> Size {
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| self.line_width(line, font_size))
            .fold(0.0, f64::max);
        Size::new(width, lines.len() as f64 * font_size * line_height)
    }

    /// Width of the widest single glyph.
    fn max_char_width(&self, font_size: f64) -> f64 {
        self.line_width("W", font_size)
    }
}

/// Fixed-advance approximation used when no font backend is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTextMeasurer;

impl TextMeasurer for ApproxTextMeasurer {
    fn line_width(&self, line: &str, font_size: f64) -> f64 {
        line.chars().count() as f64 * font_size * APPROX_CHAR_WIDTH
    }
}

/// Wrap `text` so no line exceeds `max_width`. Explicit line breaks are
/// kept, words longer than a line are split by character.
pub fn wrap_text(text: &str, font_size: f64, max_width: f64, measurer: &dyn TextMeasurer) -> String {
    if !max_width.is_finite() || max_width <= 0.0 {
        return text.to_string();
    }
    let fits = |s: &str| measurer.line_width(s, font_size) <= max_width;
    let mut lines: Vec<String> = Vec::new();

    for paragraph in text.split('\n') {
        if fits(paragraph) {
            lines.push(paragraph.to_string());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fits(&candidate) {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if fits(word) {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                let mut next = current.clone();
                next.push(ch);
                if !current.is_empty() && !fits(&next) {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = next;
                }
            }
        }
        lines.push(current);
    }
    lines.join("\n")
}

/// Usable label width inside `container`.
pub fn get_bound_text_max_width(container: &Layer) -> f64 {
    let width = container.width;
    match container.kind {
        LayerKind::Arrow(_) => width - BOUND_TEXT_PADDING * 8.0 * 2.0,
        // Largest rectangle inscribed in the ellipse.
        LayerKind::Ellipse => (width / 2.0 * SQRT_2).round() - BOUND_TEXT_PADDING * 2.0,
        // Largest rectangle inscribed in the rhombus.
        LayerKind::Diamond => (width / 2.0).round() - BOUND_TEXT_PADDING * 2.0,
        _ => width - BOUND_TEXT_PADDING * 2.0,
    }
}

/// Usable label height inside `container`.
pub fn get_bound_text_max_height(container: &Layer, text: &Layer) -> f64 {
    let height = container.height;
    match container.kind {
        LayerKind::Arrow(_) => {
            if height - BOUND_TEXT_PADDING * 8.0 * 2.0 <= 0.0 {
                text.height
            } else {
                height
            }
        }
        LayerKind::Ellipse => (height / 2.0 * SQRT_2).round() - BOUND_TEXT_PADDING * 2.0,
        LayerKind::Diamond => (height / 2.0).round() - BOUND_TEXT_PADDING * 2.0,
        _ => height - BOUND_TEXT_PADDING * 2.0,
    }
}

/// Container extent needed to fit a label extent of `dimension`.
pub fn compute_container_dimension_for_bound_text(dimension: f64, container: &LayerKind) -> f64 {
    let dimension = dimension.ceil();
    let padding = BOUND_TEXT_PADDING * 2.0;
    match container {
        LayerKind::Ellipse => ((dimension + padding) / SQRT_2 * 2.0).round(),
        LayerKind::Arrow(_) => dimension + padding * 8.0,
        LayerKind::Diamond => 2.0 * (dimension + padding),
        _ => dimension + padding,
    }
}

/// Smallest container width that still fits one glyph per line.
pub fn approx_min_line_width(font_size: f64, measurer: &dyn TextMeasurer) -> f64 {
    measurer.max_char_width(font_size) + BOUND_TEXT_PADDING * 2.0
}

/// Smallest container height that still fits one line.
pub fn approx_min_line_height(font_size: f64, line_height: f64) -> f64 {
    font_size * line_height + BOUND_TEXT_PADDING * 2.0
}

/// Font size that scales a label from `current_max_width` to
/// `next_max_width`, or `None` below [`MIN_FONT_SIZE`].
pub fn measure_font_size_from_width(
    text: &Layer,
    current_max_width: f64,
    next_max_width: f64,
) -> Option<f64> {
    let data = text.text_data()?;
    if current_max_width <= 0.0 {
        return None;
    }
    let size = data.font_size * (next_max_width / current_max_width);
    (size.is_finite() && size >= MIN_FONT_SIZE).then_some(size)
}

/// Top-left of the usable label area of a box container.
fn container_origin(container: &Layer) -> Point {
    let mut offset = Vec2::new(BOUND_TEXT_PADDING, BOUND_TEXT_PADDING);
    match container.kind {
        LayerKind::Ellipse => {
            offset.x += container.width / 2.0 * (1.0 - SQRT_2 / 2.0);
            offset.y += container.height / 2.0 * (1.0 - SQRT_2 / 2.0);
        }
        LayerKind::Diamond => {
            offset.x += container.width / 4.0;
            offset.y += container.height / 4.0;
        }
        _ => {}
    }
    Point::new(container.x, container.y) + offset
}

/// Where a label of the given size sits on an arrow: centered on the middle
/// point, or on the middle segment's midpoint for an even point count.
pub fn arrow_label_position(arrow: &Layer, label: Size) -> Point {
    let points = arrow.points();
    let center = if points.len() % 2 == 1 {
        point_global(arrow, points[points.len() / 2])
    } else if points.len() >= 2 {
        let index = points.len() / 2 - 1;
        let start = point_global(arrow, points[index]);
        let end = point_global(arrow, points[index + 1]);
        segment_mid_point(arrow, start, end, index + 1)
    } else {
        arrow.center()
    };
    Point::new(center.x - label.width / 2.0, center.y - label.height / 2.0)
}

/// Position of `text` inside `container`, following its alignment.
pub fn compute_bound_text_position(container: &Layer, text: &Layer) -> Point {
    if container.is_arrow() {
        return arrow_label_position(container, Size::new(text.width, text.height));
    }
    let origin = container_origin(container);
    let max_height = get_bound_text_max_height(container, text);
    let max_width = get_bound_text_max_width(container);
    let (align, vertical) = text
        .text_data()
        .map(|data| (data.text_align, data.vertical_align))
        .unwrap_or_default();
    let y = match vertical {
        VerticalAlign::Top => origin.y,
        VerticalAlign::Bottom => origin.y + (max_height - text.height),
        VerticalAlign::Middle => origin.y + (max_height / 2.0 - text.height / 2.0),
    };
    let x = match align {
        TextAlign::Left => origin.x,
        TextAlign::Right => origin.x + (max_width - text.width),
        TextAlign::Center => origin.x + (max_width / 2.0 - text.width / 2.0),
    };
    Point::new(x, y)
}

/// The label of `container`, if it exists and points back at it.
pub fn get_bound_text<'a>(scene: &'a Scene, container: &Layer) -> Option<&'a Layer> {
    container
        .bound_text_id()
        .and_then(|id| scene.get_non_deleted_layer(id))
        .filter(|text| text.container_id() == Some(container.id))
}

/// The container hosting `text`.
pub fn get_container<'a>(scene: &'a Scene, text: &Layer) -> Option<&'a Layer> {
    text.container_id()
        .and_then(|id| scene.get_non_deleted_layer(id))
}

/// Bind `text` to `container` as its label and lay it out.
pub fn bind_text_to_container(scene: &mut Scene, text_id: LayerId, container_id: LayerId) {
    let Some(container) = scene.get_non_deleted_layer(container_id) else {
        return;
    };
    if !container.is_text_container() || scene.get_non_deleted_layer(text_id).is_none() {
        return;
    }
    let mut bound_layers: Vec<_> = container
        .bound_layers
        .iter()
        .filter(|bound| bound.kind != crate::layer::BoundLayerKind::Text)
        .copied()
        .collect();
    bound_layers.push(crate::layer::BoundLayer::text(text_id));
    scene.mutate_quiet(container_id, LayerUpdate::bound_layers(bound_layers));
    scene.mutate_quiet(
        text_id,
        LayerUpdate {
            container_id: Some(Some(container_id)),
            ..Default::default()
        },
    );
    redraw_text_bounding_box(scene, text_id);
    scene.inform_mutation();
}

/// Re-wrap and re-measure a text layer, growing its container if the
/// label overflows and re-centering it.
pub fn redraw_text_bounding_box(scene: &mut Scene, text_id: LayerId) {
    let Some(text) = scene.get_non_deleted_layer(text_id).cloned() else {
        return;
    };
    let Some(data) = text.text_data().cloned() else {
        return;
    };
    let container = get_container(scene, &text).cloned();
    let measurer = scene.text_measurer();

    let wrapped = match &container {
        Some(container) => wrap_text(
            &data.original_text,
            data.font_size,
            get_bound_text_max_width(container),
            measurer,
        ),
        None => data.text.clone(),
    };
    let metrics = measurer.measure(&wrapped, data.font_size, data.line_height);

    let mut update = LayerUpdate {
        text: Some(wrapped),
        width: Some(metrics.width),
        height: Some(metrics.height),
        ..Default::default()
    };

    if let Some(mut container) = container {
        let sized = Layer {
            width: metrics.width,
            height: metrics.height,
            ..text.clone()
        };
        if !container.is_arrow() && metrics.height > get_bound_text_max_height(&container, &sized) {
            let height = compute_container_dimension_for_bound_text(metrics.height, &container.kind);
            scene.mutate_quiet(
                container.id,
                LayerUpdate {
                    height: Some(height),
                    ..Default::default()
                },
            );
            container.height = height;
        }
        if metrics.width > get_bound_text_max_width(&container) {
            let width = compute_container_dimension_for_bound_text(metrics.width, &container.kind);
            scene.mutate_quiet(
                container.id,
                LayerUpdate {
                    width: Some(width),
                    ..Default::default()
                },
            );
            container.width = width;
        }
        let position = compute_bound_text_position(&container, &sized);
        update.x = Some(position.x);
        update.y = Some(position.y);
        if !container.is_arrow() {
            update.angle = Some(container.angle);
        }
    }
    scene.mutate_quiet(text_id, update);
}

/// Re-layout the label of `container` after the container was resized
/// from `handle`. Corner and side handles re-wrap the text; the container
/// grows vertically when the label no longer fits.
pub fn handle_bind_text_resize(
    scene: &mut Scene,
    container_id: LayerId,
    handle: Option<TransformHandle>,
    maintain_aspect_ratio: bool,
) {
    let Some(container) = scene.get_non_deleted_layer(container_id).cloned() else {
        return;
    };
    let Some(text) = get_bound_text(scene, &container).cloned() else {
        return;
    };
    let Some(data) = text.text_data().cloned() else {
        return;
    };
    if data.text.is_empty() {
        return;
    }
    let measurer = scene.text_measurer();
    let mut wrapped = data.text.clone();
    let mut next = Size::new(text.width, text.height);
    let max_width = get_bound_text_max_width(&container);
    let max_height = get_bound_text_max_height(&container, &text);

    let vertical_only = matches!(handle, Some(TransformHandle::N | TransformHandle::S));
    if maintain_aspect_ratio || !vertical_only {
        wrapped = wrap_text(&data.original_text, data.font_size, max_width, measurer);
        next = measurer.measure(&wrapped, data.font_size, data.line_height);
    }

    let mut container = container;
    if next.height > max_height {
        let height = compute_container_dimension_for_bound_text(next.height, &container.kind);
        let diff = height - container.height;
        let from_top = matches!(
            handle,
            Some(TransformHandle::N | TransformHandle::NE | TransformHandle::NW)
        );
        let y = if !container.is_arrow() && from_top {
            container.y - diff
        } else {
            container.y
        };
        scene.mutate_quiet(
            container_id,
            LayerUpdate {
                height: Some(height),
                y: Some(y),
                ..Default::default()
            },
        );
        container.height = height;
        container.y = y;
    }

    let sized = Layer {
        width: next.width,
        height: next.height,
        ..text.clone()
    };
    let position = compute_bound_text_position(&container, &sized);
    scene.mutate_quiet(
        text.id,
        LayerUpdate {
            text: Some(wrapped),
            width: Some(next.width),
            height: Some(next.height),
            x: Some(position.x),
            y: Some(position.y),
            ..Default::default()
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_by_words() {
        let measurer = ApproxTextMeasurer;
        // 10px font: each char is 5.5px wide, 60px fits 10 chars.
        let wrapped = wrap_text("hello big world", 10.0, 60.0, &measurer);
        assert_eq!(wrapped, "hello big\nworld");
        assert_eq!(wrap_text("short", 10.0, 60.0, &measurer), "short");
    }

    #[test]
    fn test_wrap_breaks_long_words() {
        let measurer = ApproxTextMeasurer;
        let wrapped = wrap_text("abcdefghijkl", 10.0, 35.0, &measurer);
        assert_eq!(wrapped, "abcdef\nghijkl");
    }

    #[test]
    fn test_container_limits() {
        let rect = Layer::rectangle(0.0, 0.0, 100.0, 50.0);
        assert!((get_bound_text_max_width(&rect) - 90.0).abs() < f64::EPSILON);
        let diamond = Layer::diamond(0.0, 0.0, 100.0, 50.0);
        assert!((get_bound_text_max_width(&diamond) - 40.0).abs() < f64::EPSILON);
        let ellipse = Layer::ellipse(0.0, 0.0, 100.0, 50.0);
        assert!((get_bound_text_max_width(&ellipse) - 61.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_container_dimension_for_text() {
        assert!((compute_container_dimension_for_bound_text(20.0, &LayerKind::Rectangle) - 30.0).abs() < f64::EPSILON);
        assert!((compute_container_dimension_for_bound_text(20.0, &LayerKind::Diamond) - 60.0).abs() < f64::EPSILON);
        assert!(
            (compute_container_dimension_for_bound_text(20.0, &LayerKind::Ellipse) - (30.0 / SQRT_2 * 2.0).round()).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_bound_text_centered_in_rectangle() {
        let rect = Layer::rectangle(0.0, 0.0, 100.0, 100.0);
        let mut text = Layer::text(0.0, 0.0, 20.0, 10.0, "x", 8.0);
        if let LayerKind::Text(data) = &mut text.kind {
            data.text_align = TextAlign::Center;
        }
        let p = compute_bound_text_position(&rect, &text);
        assert!((p.x - 40.0).abs() < 1e-9);
        assert!((p.y - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_bind_text_grows_container() {
        let mut scene = Scene::new();
        let rect = scene.insert_layer(Layer::rectangle(0.0, 0.0, 40.0, 20.0)).unwrap();
        let text = scene
            .insert_layer(Layer::text(0.0, 0.0, 0.0, 0.0, "one two three four", 20.0))
            .unwrap();
        bind_text_to_container(&mut scene, text, rect);

        let container = scene.get_layer(rect).unwrap();
        let label = scene.get_layer(text).unwrap();
        assert_eq!(container.bound_text_id(), Some(text));
        assert_eq!(label.container_id(), Some(rect));
        assert!(label.height <= get_bound_text_max_height(container, label) + 1e-9);
        assert!(container.height > 20.0);
    }

    #[test]
    fn test_font_size_from_width() {
        let text = Layer::text(0.0, 0.0, 10.0, 10.0, "a", 20.0);
        assert_eq!(measure_font_size_from_width(&text, 100.0, 50.0), Some(10.0));
        assert_eq!(measure_font_size_from_width(&text, 100.0, 1.0), None);
    }
}
