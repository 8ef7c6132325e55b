use criterion::{black_box, criterion_group, criterion_main, Criterion};
use swerve_drive_core::{
    kinematics::{
        chassis_speeds::BodyMotion,
        module_state::{ModuleState, ModuleTarget},
        swerve_kinematics::{desaturate, SwerveKinematics},
    },
    rotation::Rotation,
    NUMBER_OF_MODULES,
};

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets =
        swerve_kinematics_to_module_targets_body_frame,
        swerve_kinematics_to_module_targets_field_frame,
        swerve_kinematics_to_body_motion,
        swerve_kinematics_desaturate,
}

criterion_main!(benches);

fn create_kinematics() -> SwerveKinematics {
    SwerveKinematics::from_track(0.5, 0.5).unwrap()
}

pub fn swerve_kinematics_to_module_targets_body_frame(c: &mut Criterion) {
    let kinematics = create_kinematics();
    let current_angles = [Rotation::from_degrees(10.0); NUMBER_OF_MODULES];

    c.bench_function("SwerveKinematics::to_module_targets<body>", |b| {
        b.iter(|| {
            kinematics.to_module_targets(
                black_box(&BodyMotion::body(1.0, 0.5, 1.0)),
                black_box(Rotation::zero()),
                black_box(&current_angles),
            )
        })
    });
}

pub fn swerve_kinematics_to_module_targets_field_frame(c: &mut Criterion) {
    let kinematics = create_kinematics();
    let current_angles = [Rotation::from_degrees(10.0); NUMBER_OF_MODULES];

    c.bench_function("SwerveKinematics::to_module_targets<field>", |b| {
        b.iter(|| {
            kinematics.to_module_targets(
                black_box(&BodyMotion::field(1.0, 0.5, 1.0)),
                black_box(Rotation::from_degrees(30.0)),
                black_box(&current_angles),
            )
        })
    });
}

pub fn swerve_kinematics_to_body_motion(c: &mut Criterion) {
    let kinematics = create_kinematics();
    let states = [
        ModuleState::new(1.0, Rotation::from_degrees(10.0)),
        ModuleState::new(1.1, Rotation::from_degrees(15.0)),
        ModuleState::new(0.9, Rotation::from_degrees(5.0)),
        ModuleState::new(1.0, Rotation::from_degrees(12.0)),
    ];

    c.bench_function("SwerveKinematics::to_body_motion", |b| {
        b.iter(|| kinematics.to_body_motion(black_box(&states)))
    });
}

pub fn swerve_kinematics_desaturate(c: &mut Criterion) {
    let targets = [
        ModuleTarget::new(10.0, Rotation::zero()),
        ModuleTarget::new(5.0, Rotation::from_degrees(45.0)),
        ModuleTarget::new(2.0, Rotation::from_degrees(90.0)),
        ModuleTarget::new(-8.0, Rotation::from_degrees(135.0)),
    ];

    c.bench_function("desaturate", |b| {
        b.iter(|| {
            let mut copy = black_box(targets);
            desaturate(&mut copy, black_box(5.0))
        })
    });
}
