//! Built-in handlers for geometry objects.
//!
//! Script hosts model geometry as plain objects; these handlers expose the
//! derived values a GIS user looks for, such as well-known text.

use std::fmt::Write as _;

use crate::inspect::handlers::{ChildSink, HandlerRegistry};
use crate::value::{ObjectValue, Value};

/// Register the `Point`, `Rectangle` and `Geometry` handlers.
pub fn register_geometry_handlers(registry: &mut HandlerRegistry) {
    registry.register("Point", handle_point);
    registry.register("Rectangle", handle_rectangle);
    registry.register("Geometry", handle_geometry);
}

fn handle_point(value: &Value, out: &mut ChildSink) {
    let Some((x, y)) = as_object(value).and_then(point_coords) else {
        return;
    };
    out.push("wkt", format!("POINT ({} {})", fmt_coord(x), fmt_coord(y)));
}

fn handle_rectangle(value: &Value, out: &mut ChildSink) {
    let Some(object) = as_object(value) else {
        return;
    };
    let coords = ["x_min", "y_min", "x_max", "y_max"].map(|name| number(object, name));
    let [Some(x_min), Some(y_min), Some(x_max), Some(y_max)] = coords else {
        return;
    };
    out.push("width", x_max - x_min);
    out.push("height", y_max - y_min);
    let ring = [
        (x_min, y_min),
        (x_max, y_min),
        (x_max, y_max),
        (x_min, y_max),
        (x_min, y_min),
    ];
    out.push("wkt", format!("POLYGON (({}))", coord_list(&ring)));
}

fn handle_geometry(value: &Value, out: &mut ChildSink) {
    let Some(object) = as_object(value) else {
        return;
    };
    let Some(kind) = object.field("kind").and_then(Value::as_str) else {
        return;
    };
    let points: Vec<(f64, f64)> = match object.field("points") {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|item| as_object(item).and_then(point_coords))
            .collect(),
        _ => Vec::new(),
    };
    let (code, wkt) = match kind.to_ascii_lowercase().as_str() {
        "point" => (1, points.first().map_or_else(
            || "POINT EMPTY".to_string(),
            |(x, y)| format!("POINT ({} {})", fmt_coord(*x), fmt_coord(*y)),
        )),
        "linestring" => (2, tagged("LINESTRING", &points, |list| format!("({list})"))),
        "polygon" => (3, tagged("POLYGON", &points, |list| format!("(({list}))"))),
        _ => return,
    };
    out.push("wkb_type", Value::Int(code));
    out.push("wkt", wkt);
}

fn tagged(tag: &str, points: &[(f64, f64)], wrap: impl Fn(&str) -> String) -> String {
    if points.is_empty() {
        return format!("{tag} EMPTY");
    }
    format!("{tag} {}", wrap(&coord_list(points)))
}

fn as_object(value: &Value) -> Option<&ObjectValue> {
    match value {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

fn number(object: &ObjectValue, name: &str) -> Option<f64> {
    object.field(name).and_then(Value::as_float)
}

fn point_coords(object: &ObjectValue) -> Option<(f64, f64)> {
    Some((number(object, "x")?, number(object, "y")?))
}

fn coord_list(points: &[(f64, f64)]) -> String {
    let mut out = String::new();
    for (idx, (x, y)) in points.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} {}", fmt_coord(*x), fmt_coord(*y));
    }
    out
}

fn fmt_coord(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use expect_test::expect;
    use smol_str::SmolStr;

    use super::*;
    use crate::inspect::render::render;
    use crate::inspect::tree::VariableTree;

    fn point(x: i64, y: i64) -> Value {
        ObjectValue::new("Point")
            .with_field("x", Value::Int(x))
            .with_field("y", Value::Int(y))
            .into()
    }

    fn registry() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        register_geometry_handlers(&mut registry);
        Arc::new(registry)
    }

    #[test]
    fn rectangle_exposes_extent_and_wkt() {
        let rect = ObjectValue::new("Rectangle")
            .with_field("x_min", Value::Int(0))
            .with_field("y_min", Value::Int(0))
            .with_field("x_max", Value::Float(4.5))
            .with_field("y_max", Value::Int(2));
        let mut tree =
            VariableTree::from_bindings([(SmolStr::from("extent"), rect.into())], registry());
        expect![[r#"
            extent = {Rectangle} <Rectangle object>
              x_min = {int} 0
              y_min = {int} 0
              x_max = {float} 4.5
              y_max = {int} 2
              width = {float} 4.5
              height = {float} 2.0
              wkt = {str} "POLYGON ((0 0, 4.5 0, 4.5 2, 0 2, 0 0))"
        "#]]
        .assert_eq(&render(&mut tree, 2));
    }

    #[test]
    fn geometry_line_string() {
        let line = ObjectValue::new("Geometry")
            .with_field("kind", Value::from("LineString"))
            .with_field("points", Value::List(vec![point(1, 2), point(3, 4)]));
        let mut sink = ChildSink::default();
        handle_geometry(&line.into(), &mut sink);
        assert_eq!(
            sink.into_entries(),
            vec![
                (SmolStr::from("wkb_type"), Value::Int(2)),
                (SmolStr::from("wkt"), Value::from("LINESTRING (1 2, 3 4)")),
            ]
        );
    }

    #[test]
    fn point_without_coordinates_contributes_nothing() {
        let mut sink = ChildSink::default();
        handle_point(&ObjectValue::new("Point").into(), &mut sink);
        assert!(sink.is_empty());
        handle_point(&point(3, -1), &mut sink);
        assert_eq!(sink.into_entries(), vec![(SmolStr::from("wkt"), Value::from("POINT (3 -1)"))]);
    }
}
