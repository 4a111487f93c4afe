//! Two templates, one detected contour that only template 2 accepts.

use approx::assert_abs_diff_eq;
use cell_math::Homography;
use nalgebra::{Matrix3, Point2, Vector2};
use shared::contour::Contour;
use test_helpers::{l_shape, rectangle, resample, transformed};
use workpiece::{
    AlignmentEngine, ContourMatcher, PathGenerator, SegmentSettings, ShapeScorer,
    WorkpieceTemplate,
};

/// Scores 85% against template 2 and 40% against everything else.
struct Scenario;

impl ShapeScorer for Scenario {
    fn similarity(&self, template: &WorkpieceTemplate, _detected: &Contour) -> f64 {
        if template.id == 2 {
            85.0
        } else {
            40.0
        }
    }
}

fn make_templates() -> Vec<WorkpieceTemplate> {
    let stroke = Contour::from_xy(&[[260.0, 190.0], [340.0, 190.0], [340.0, 210.0]]);
    vec![
        WorkpieceTemplate::new(1, 3.0, l_shape(1.5, Point2::new(50.0, 50.0))),
        WorkpieceTemplate::new(2, 8.0, rectangle(100.0, 40.0, Point2::new(300.0, 200.0)))
            .with_stroke(stroke, SegmentSettings::default()),
    ]
}

#[test]
fn scenario_a_single_match_on_template_2() {
    let templates = make_templates();
    let detected = transformed(&templates[1].outline, 12.0, Vector2::new(4.0, -3.0));

    let result = ContourMatcher::new(Scenario).match_contours(&templates, vec![detected]);

    assert_eq!(result.matches.len(), 1);
    assert!(result.unmatched.is_empty());
    let m = &result.matches[0];
    assert_eq!(m.template.id, 2);
    assert_abs_diff_eq!(m.similarity, 85.0);
    assert_abs_diff_eq!(m.rotation_delta_deg, 12.0, epsilon = 1e-6);
    assert_abs_diff_eq!(m.centroid_delta.x, 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(m.centroid_delta.y, -3.0, epsilon = 1e-6);
}

#[test]
fn scenario_a_with_hu_moments_and_dense_contour() {
    let templates = make_templates();
    // Vision delivers many more points than the template outline holds
    let detected = resample(
        &transformed(&templates[1].outline, 12.0, Vector2::new(4.0, -3.0)),
        25,
    );

    let result = ContourMatcher::default().match_contours(&templates, vec![detected]);
    let m = &result.require_matches().unwrap().matches[0];
    assert_eq!(m.template.id, 2);
    assert_abs_diff_eq!(m.rotation_delta_deg, 12.0, epsilon = 1e-6);
}

#[test]
fn scenario_a_through_to_robot_paths() {
    let templates = make_templates();
    let delta = Vector2::new(4.0, -3.0);
    let detected = transformed(&templates[1].outline, 12.0, delta);
    let result = ContourMatcher::new(Scenario).match_contours(&templates, vec![detected]);

    let aligned = AlignmentEngine::default().align(&result.matches[0]);
    let centroid = aligned.template.outline.centroid();
    assert_abs_diff_eq!(centroid.x, 304.0, epsilon = 1e-6);
    assert_abs_diff_eq!(centroid.y, 197.0, epsilon = 1e-6);

    let h = Homography::new(Matrix3::new(0.0, -0.5, 400.0, -0.5, 0.0, 150.0, 0.0, 0.0, 1.0))
        .unwrap();
    let paths = PathGenerator::new(20.0)
        .build_paths(&aligned, &h, &SegmentSettings::default())
        .unwrap();

    assert_eq!(paths.len(), 1);
    let stroke = &aligned.template.spray_pattern.stroke[0].contour;
    for (pose, px) in paths[0].poses().iter().zip(stroke.points()) {
        assert_abs_diff_eq!(pose.x, 400.0 - 0.5 * px.y, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.y, 150.0 - 0.5 * px.x, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.z, 20.0 + 8.0 + 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.rz, 12.0, epsilon = 1e-6);
    }
}
