//! Test doubles for the motors and sensors. Each double shares its state with the test through a
//! handle so that the test can script readings and inspect commands after the double has been
//! moved into a module or the drive.

use std::{cell::RefCell, rc::Rc};

use super::{
    actuator_interface::HardwareMotor,
    sensor_interface::{AbsoluteEncoder, OrientationSensor},
};

#[derive(Debug, Default)]
pub(crate) struct MockMotorState {
    pub position: Option<f64>,
    pub velocity: Option<f64>,
    pub voltages: Vec<f64>,
    pub position_resets: Vec<f64>,
}

#[derive(Clone, Debug)]
pub(crate) struct MockMotor {
    state: Rc<RefCell<MockMotorState>>,
}

impl MockMotor {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockMotorState {
                position: Some(0.0),
                velocity: Some(0.0),
                voltages: Vec::new(),
                position_resets: Vec::new(),
            })),
        }
    }

    pub fn last_voltage(&self) -> Option<f64> {
        self.state.borrow().voltages.last().copied()
    }

    pub fn position_resets(&self) -> Vec<f64> {
        self.state.borrow().position_resets.clone()
    }

    pub fn set_position(&self, rotations: Option<f64>) {
        self.state.borrow_mut().position = rotations;
    }

    pub fn set_velocity(&self, rpm: Option<f64>) {
        self.state.borrow_mut().velocity = rpm;
    }

    pub fn voltage_count(&self) -> usize {
        self.state.borrow().voltages.len()
    }
}

impl HardwareMotor for MockMotor {
    fn encoder_position(&self) -> Option<f64> {
        self.state.borrow().position
    }

    fn encoder_velocity(&self) -> Option<f64> {
        self.state.borrow().velocity
    }

    fn reset_encoder_position(&mut self, rotations: f64) {
        let mut state = self.state.borrow_mut();
        state.position = Some(rotations);
        state.position_resets.push(rotations);
    }

    fn set_voltage(&mut self, volts: f64) {
        self.state.borrow_mut().voltages.push(volts);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MockAbsoluteEncoder {
    rotations: Rc<RefCell<Option<f64>>>,
}

impl MockAbsoluteEncoder {
    pub fn new(rotations: Option<f64>) -> Self {
        Self {
            rotations: Rc::new(RefCell::new(rotations)),
        }
    }

    pub fn set_rotations(&self, rotations: Option<f64>) {
        *self.rotations.borrow_mut() = rotations;
    }
}

impl AbsoluteEncoder for MockAbsoluteEncoder {
    fn absolute_rotations(&self) -> Option<f64> {
        *self.rotations.borrow()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MockOrientationSensor {
    yaw: Rc<RefCell<Option<f64>>>,
    pitch: Rc<RefCell<Option<f64>>>,
}

impl MockOrientationSensor {
    pub fn new() -> Self {
        Self {
            yaw: Rc::new(RefCell::new(Some(0.0))),
            pitch: Rc::new(RefCell::new(Some(0.0))),
        }
    }

    pub fn set_pitch(&self, degrees: Option<f64>) {
        *self.pitch.borrow_mut() = degrees;
    }

    pub fn set_yaw(&self, degrees: Option<f64>) {
        *self.yaw.borrow_mut() = degrees;
    }
}

impl OrientationSensor for MockOrientationSensor {
    fn pitch_degrees(&self) -> Option<f64> {
        *self.pitch.borrow()
    }

    fn yaw_degrees(&self) -> Option<f64> {
        *self.yaw.borrow()
    }
}
