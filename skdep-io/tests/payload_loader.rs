use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use skdep_core::model::{GeometryKind, SketchGeometry, SketchPlane};
use skdep_io::{DataSource, HttpSource, IoError, LocalFileSource};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_sample_payload_from_disk() {
    let source = LocalFileSource::new(fixture("sample_payload.json"));
    let data = source.fetch().expect("读取样例负载失败");

    // 椭圆记录不被支持，应被跳过
    assert_eq!(data.entities.len(), 7);
    assert!(data.entity("JHI").is_none());
    assert_eq!(data.dependency_range(), Some((0, 4)));

    let counts: Vec<(&str, u32)> = data
        .entities
        .iter()
        .map(|entity| (entity.id.as_str(), entity.dependency_count()))
        .collect();
    assert!(counts.contains(&("JHC", 4)));
    assert!(counts.contains(&("JHE", 0)));

    let construction = data.entity("JHH").expect("缺少构造线");
    assert!(construction.is_construction);
    assert_eq!(construction.plane, SketchPlane::Top);

    let arc = data.entity("JHE").expect("缺少圆弧");
    match arc.geometry {
        SketchGeometry::Circle {
            center, clockwise, ..
        } => {
            assert!((center.x() - 0.25).abs() < 1e-9);
            assert!(clockwise);
        }
        ref other => panic!("期望圆弧，实际为 {other:?}"),
    }

    let spline = data.entity("JHF").expect("缺少样条");
    assert_eq!(spline.geometry_kind(), GeometryKind::Spline);
    assert!(spline.edges[0].workspace.is_none());
    assert!(spline.edges[1].element_key().is_none());
}

#[test]
fn sample_metadata_resolves_names() {
    let data = LocalFileSource::new(fixture("sample_payload.json"))
        .fetch()
        .expect("读取样例负载失败");
    let metadata = &data.metadata;
    assert_eq!(metadata.documents().count(), 2);
    assert_eq!(
        metadata.document_name("85b058cdb321e64ab5d1f364"),
        "Robot Drivetrain"
    );
    assert_eq!(
        metadata.element_name("85b058cdb321e64ab5d1f364", "0e0e0e0e0e0e0e0e0e0e0e0e"),
        "Assembly 1"
    );
    assert_eq!(
        metadata.element_name("c3d9e1f0a2b4c6d8e0f1a2b3", "4a5b6c7d8e9f0a1b2c3d4e5f"),
        "4a5b6c7d8e9f0a1b2c3d4e5f"
    );
    let master = metadata
        .feature(
            "85b058cdb321e64ab5d1f364",
            "78ac040ab4d3dfed2febd8a3",
            "FsKetch00MasterA_0",
        )
        .expect("缺少主草图特征");
    assert_eq!(master.name.as_deref(), Some("Master Sketch"));
}

#[test]
fn missing_file_reports_read_error() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let source = LocalFileSource::new(dir.path().join("absent.json"));
    let error = source.fetch().expect_err("不存在的文件应报错");
    assert!(matches!(error, IoError::ReadError { .. }));
}

#[test]
fn malformed_file_reports_decode_error() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("broken.json");
    fs::write(&path, "[{\"JHB\": ").expect("写入临时文件失败");
    let error = LocalFileSource::new(&path)
        .fetch()
        .expect_err("截断的负载应报错");
    assert!(matches!(error, IoError::Json(_)));

    fs::write(&path, "\"just a string\"").expect("写入临时文件失败");
    let error = LocalFileSource::new(&path)
        .fetch()
        .expect_err("字符串顶层应报错");
    assert!(matches!(error, IoError::InvalidPayload(_)));
}

#[test]
fn unreachable_endpoint_reports_http_error() {
    let source = HttpSource::new("http://127.0.0.1:9/get_dependency", Duration::from_secs(2));
    assert!(source.describe().contains("127.0.0.1:9"));
    let error = source.fetch().expect_err("无法连接的端点应报错");
    assert!(matches!(error, IoError::Http { .. }));
}
