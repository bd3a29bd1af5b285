//! Shape builders, setters and velocity callbacks against the kernel.

use approx::assert_relative_eq;

use cad_kernel::{Context, Entity, Section, SectionVelocity};
use cad_sensitivity::params::{fixed, params};
use cad_sensitivity::{CaseVelocity, ParamSet, Scope, SectionSpec, Shape};

const UNIT_CIRCLE: [f64; 10] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0];

fn all_shapes() -> Vec<(SectionSpec, Vec<f64>)> {
    let square = vec![0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.5, 0.0];
    vec![
        (SectionSpec::new(Shape::Node, params(0, 3)), vec![1.0, 2.0, 3.0]),
        (
            SectionSpec::new(Shape::LineTwoPoints, params(0, 6)),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0],
        ),
        (
            SectionSpec::new(Shape::LinePointDir, params(0, 8)),
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 2.0],
        ),
        (SectionSpec::new(Shape::CircleOneEdge, params(0, 10)), UNIT_CIRCLE.to_vec()),
        (SectionSpec::new(Shape::CircleTwoEdge, params(0, 10)), UNIT_CIRCLE.to_vec()),
        (SectionSpec::new(Shape::Square, params(0, 9)).capped(), square.clone()),
        (
            SectionSpec::new(Shape::Triangle, params(0, 9)).capped(),
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        ),
        (SectionSpec::new(Shape::Naca { sharp: true }, params(0, 3)), vec![0.02, 0.4, 0.12]),
        (SectionSpec::new(Shape::Naca { sharp: false }, params(0, 3)), vec![0.02, 0.4, 0.12]),
        (
            SectionSpec::new(Shape::NoseNode, [params(0, 9), fixed(&[-0.3])].concat()),
            UNIT_CIRCLE[..9].to_vec(),
        ),
        (
            SectionSpec::new(Shape::Square.transformed(), params(0, 13)).capped(),
            [square, vec![2.0, 0.0, 0.0, 1.0]].concat(),
        ),
    ]
}

#[test]
fn every_shape_builds_takes_sensitivities_and_cleans_up() {
    let mut ctx = Context::new();
    for (spec, values) in all_shapes() {
        let base = ParamSet::new(values);
        for i in 0..base.len() {
            let seeded = base.unit(i);
            let mut scope = Scope::new(&mut ctx);
            let section = spec.build(&mut scope, &seeded).unwrap();
            spec.set_dots(&mut scope, section, &seeded).unwrap();
            assert!(
                scope.has_geometry_dot(Entity::from(section)).unwrap(),
                "{} missing sensitivities for parameter {i}",
                spec.shape.name()
            );
        }
        assert_eq!(ctx.live_count(), 0, "{} leaked", spec.shape.name());
    }
}

#[test]
fn transformed_circle_node_moves_with_offset() {
    let mut ctx = Context::new();
    let spec = SectionSpec::new(Shape::CircleOneEdge.transformed(), params(0, 14));
    let values: Vec<f64> = [&UNIT_CIRCLE[..], &[2.0, 0.0, 0.0, 3.0][..]].concat();
    // Derivative along the z offset.
    let seeded = ParamSet::new(values).unit(13);

    let mut scope = Scope::new(&mut ctx);
    let section = spec.build(&mut scope, &seeded).unwrap();
    spec.set_dots(&mut scope, section, &seeded).unwrap();
    let lp = scope.outer_loop(Entity::from(section)).unwrap();
    let (edges, _) = scope.loop_edges(lp).unwrap();
    let node = scope.store().get_edge(edges[0]).unwrap().nodes[0];

    let xyz = scope.node_position(node).unwrap();
    assert_relative_eq!(xyz[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(xyz[2], 3.0, epsilon = 1e-12);
    let dot = scope.node_dot(node).unwrap();
    assert_relative_eq!(dot[2], 1.0, epsilon = 1e-12);
    assert_relative_eq!(dot[0], 0.0, epsilon = 1e-12);
}

#[test]
fn velocity_callbacks_match_stored_node_and_range() {
    let mut ctx = Context::new();
    let spec = SectionSpec::new(Shape::LinePointDir, params(0, 8));
    // Derivative along the end parameter.
    let seeded = ParamSet::new(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 2.0]).unit(7);

    let mut scope = Scope::new(&mut ctx);
    let section = spec.build(&mut scope, &seeded).unwrap();
    spec.set_dots(&mut scope, section, &seeded).unwrap();
    let vels = CaseVelocity::new(std::slice::from_ref(&spec), &[section], &seeded).unwrap();

    let Section::Loop(lp) = section else {
        panic!("line is a loop section");
    };
    let (edges, _) = scope.loop_edges(lp).unwrap();
    let range = vels.range_velocity(&scope, 0, edges[0]).unwrap();
    assert_eq!(range.range, [0.5, 2.0]);
    assert_eq!(range.range_dot, [0.0, 1.0]);
    assert_eq!(scope.range_dot(edges[0]).unwrap(), range.range_dot);

    let end = scope.store().get_edge(edges[0]).unwrap().nodes[1];
    let p = vels.node_velocity(&scope, 0, end, Some(edges[0])).unwrap();
    assert_relative_eq!(p.xyz[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(p.xyz_dot[0], 1.0, epsilon = 1e-12);
    assert_eq!(scope.node_dot(end).unwrap(), p.xyz_dot);

    let samples = vels.edge_velocity(&scope, 0, edges[0], &[1.0], &[0.5]).unwrap();
    assert_relative_eq!(samples.xyz_dot[0][0], 0.5, epsilon = 1e-12);
    assert_relative_eq!(samples.tangents[1][0], 1.0, epsilon = 1e-12);

    assert!(vels.bspline_velocity(&scope, 0, edges[0]).is_err());
}
