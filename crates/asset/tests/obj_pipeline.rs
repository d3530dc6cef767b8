//! Parse a model and push one of its groups through a vertex format.

use asset::vertex_format::{PositionNormalVertex, PositionNormalVertexFormat};
use asset::{AttributeKind, ObjModel, VertexFormat, VertexFormatKind};

const PANEL: &str = r#"
# a single planar quad, no normals
g panel
v -1.0 -1.0 0.0
v  1.0 -1.0 0.0
v  1.0  1.0 0.0
v -1.0  1.0 0.0
f 1 2 3 4
"#;

#[test]
fn quad_end_to_end() {
    let model = ObjModel::parse_str(PANEL, true).expect("parse panel");
    let group = model.group_for_name("panel").expect("panel group");

    assert_eq!(group.vertex_count(), 4);
    let indices = group.indices();
    assert_eq!(indices.len(), 6);
    assert_eq!(&indices[..3], &[0, 1, 2]);
    assert_eq!(&indices[3..], &[0, 2, 3]);

    let normals = group.normals().expect("generated normals");
    assert_eq!(normals.len(), 4);
    for n in normals {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-6);
        assert_eq!(n, &normals[0]);
    }
}

#[test]
fn group_streams_feed_vertex_format() {
    let model = ObjModel::parse_str(PANEL, true).unwrap();
    let group = model.group_at_index(0).unwrap();

    let mut format = PositionNormalVertexFormat::new(group.vertex_count() as usize);
    for layout in format.attributes() {
        let data = group.attribute_data(layout.kind).expect("stream present");
        format.set_attribute_bytes(layout.kind, data).unwrap();
    }
    let records: Vec<PositionNormalVertex> = format.encode_records().unwrap();

    assert_eq!(records.len(), 4);
    for (record, (p, n)) in records
        .iter()
        .zip(group.positions().iter().zip(group.normals().unwrap()))
    {
        assert_eq!(&record.position, p);
        assert_eq!(&record.normal, n);
    }
}

#[test]
fn factory_format_reports_missing_color_stream() {
    let model = ObjModel::parse_str(PANEL, false).unwrap();
    let group = model.group_at_index(0).unwrap();
    let format = VertexFormatKind::PositionColor.create(group.vertex_count() as usize);
    assert!(format.requires(AttributeKind::Color));
    assert!(group.attribute_data(AttributeKind::Color).is_none());
}
