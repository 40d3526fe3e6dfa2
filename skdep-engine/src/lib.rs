pub mod command;
pub mod highlight;
pub mod index;
pub mod inspect;
pub mod overlay;
pub mod picking;
pub mod primitive;
pub mod range;
pub mod search;
pub mod session;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("entity with id {0} not found")]
        EntityNotFound(String),
        #[error("invalid argument for `{command}`: {reason}")]
        InvalidArgument {
            command: &'static str,
            reason: String,
        },
    }
}

pub mod demo {
    use std::f64::consts::PI;

    use glam::DVec2;
    use skdep_core::geometry::Point2;
    use skdep_core::model::{
        DependencyEdge, DocumentInfo, ElementInfo, FeatureInfo, MetadataTree, SketchData,
        SketchEntity, SketchGeometry,
    };

    /// 内置样例：一个底盘轮廓草图及其下游依赖，无法加载任何数据源时使用。
    pub fn demo_data() -> SketchData {
        let chassis = |feature: &str| DependencyEdge::new("dDrive", "wDrive", "eChassis", feature);
        let arm = |feature: &str| DependencyEdge::new("dArm", "wArm", "eArm", feature);
        let layout = |feature: &str| DependencyEdge::new("dDrive", "wDrive", "eLayout", feature);

        let line = |id: &str, from: (f64, f64), to: (f64, f64)| {
            let direction = DVec2::new(to.0 - from.0, to.1 - from.1);
            SketchEntity::new(
                id,
                SketchGeometry::Line {
                    origin: Point2::new(from.0, from.1),
                    direction: direction.normalize_or_zero(),
                },
            )
            .with_params(0.0, direction.length())
        };

        let mut entities = vec![
            line("JHB", (-6.0, -4.0), (6.0, -4.0)).with_edges([
                chassis("FExtrudeBase"),
                chassis("FFilletBase"),
            ]),
            line("JHC", (6.0, -4.0), (6.0, 4.0)).with_edges([
                chassis("FExtrudeBase"),
                chassis("FFilletBase"),
                arm("FArmMount"),
                arm("FArmPivot"),
                layout("FLayout"),
            ]),
            line("JHD", (6.0, 4.0), (-6.0, 4.0)).with_edges([chassis("FExtrudeBase")]),
            line("JHE", (-6.0, 4.0), (-6.0, -4.0)).with_edges([
                chassis("FExtrudeBase"),
                chassis("FFilletBase"),
                chassis("FPocket"),
                arm("FArmMount"),
                arm("FArmPivot"),
                arm("FArmSlot"),
                layout("FLayout"),
                layout("FLayoutRef"),
                DependencyEdge::new("dArm", "wArm", "eGripper", "FGripperBase"),
            ]),
            SketchEntity::new(
                "JHF",
                SketchGeometry::Circle {
                    center: Point2::new(0.0, 0.0),
                    radius: 1.5,
                    clockwise: false,
                },
            )
            .with_edges([chassis("FPocket"), arm("FArmPivot")]),
            SketchEntity::new(
                "JHG",
                SketchGeometry::Circle {
                    center: Point2::new(4.0, 2.0),
                    radius: 1.0,
                    clockwise: false,
                },
            )
            .with_params(0.0, PI)
            .with_edges([arm("FArmSlot")]),
            SketchEntity::new(
                "JHH",
                SketchGeometry::Spline {
                    points: vec![
                        Point2::new(-5.0, -3.0),
                        Point2::new(-3.0, -1.0),
                        Point2::new(-1.0, -2.5),
                        Point2::new(1.0, -1.0),
                    ],
                    handles: None,
                },
            )
            .with_edges([layout("FLayoutRef"), arm("FArmSlot"), arm("FArmMount")]),
            SketchEntity::new("JHI", SketchGeometry::Point { position: Point2::new(0.0, 3.0) }),
            line("JHJ", (0.0, -4.0), (0.0, 4.0)).with_edges([layout("FLayout")]),
        ];
        // 中心线为构造线
        if let Some(construction) = entities.last_mut() {
            construction.is_construction = true;
        }

        let metadata = MetadataTree::new()
            .with_document(
                "dDrive",
                DocumentInfo::named("Drivebase")
                    .with_workspace("wDrive")
                    .with_element(
                        "eChassis",
                        ElementInfo::named("Chassis Plate")
                            .with_feature("FExtrudeBase", FeatureInfo::new("Extrude Base", "extrude"))
                            .with_feature("FFilletBase", FeatureInfo::new("Fillet Corners", "fillet"))
                            .with_feature("FPocket", FeatureInfo::new("Bearing Pocket", "extrude")),
                    )
                    .with_element(
                        "eLayout",
                        ElementInfo::named("Layout")
                            .with_feature("FLayout", FeatureInfo::new("Master Sketch", "newSketch"))
                            .with_feature("FLayoutRef", FeatureInfo::new("Reference Plane", "cPlane")),
                    )
                    .with_element("eBom", ElementInfo::named("Bill of Materials")),
            )
            .with_document(
                "dArm",
                DocumentInfo::named("Intake Arm")
                    .with_workspace("wArm")
                    .with_element(
                        "eArm",
                        ElementInfo::named("Arm Tube")
                            .with_feature("FArmMount", FeatureInfo::new("Mount Holes", "hole"))
                            .with_feature("FArmPivot", FeatureInfo::new("Pivot Axis", "revolve"))
                            .with_feature("FArmSlot", FeatureInfo::new("Slot Cut", "extrude")),
                    )
                    .with_element(
                        "eGripper",
                        ElementInfo::named("Gripper")
                            .with_feature("FGripperBase", FeatureInfo::new("Gripper Base", "extrude")),
                    ),
            );

        SketchData::new(entities, metadata)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn demo_covers_every_geometry_kind() {
            let data = demo_data();
            assert_eq!(data.entities.len(), 9);
            assert_eq!(data.dependency_range(), Some((0, 9)));
            let kinds: std::collections::HashSet<_> =
                data.entities.iter().map(|entity| entity.geometry_kind()).collect();
            assert_eq!(kinds.len(), 4);
            assert!(data.metadata.feature("dDrive", "eLayout", "FLayout").is_some());
        }
    }
}
