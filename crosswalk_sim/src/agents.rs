// The two moving agents: a car on the road and a pedestrian on the crossing.
//
// Car, before it is released:
// - RED:   stop (and remember that it has stopped once),
// - AMBER: advance at `car_speed * amber_factor`,
// - GREEN: advance at full speed. If it has already stopped once, it first
//          waits `reaction_delay_steps` steps, then moves off and is
//          released.
// A released car ignores the light and cruises at full speed until reset.
//
// Pedestrian: waits until the light is RED, then starts crossing and never
// stops again, even if the light changes. Once `z` reaches `ped_end_z` it is
// marked finished (which lets the light go back to green) but keeps walking.
//
// Each agent reports its state as a `state` message whose `action` names
// what it just did, using the action vocabulary the host expects.

use crosswalk_protocol::{LightColor, Message, RESET_ACTION};
use tracing::info;

use crate::params::SimParams;

pub const CAR_ID: &str = "car_1";
pub const PEDESTRIAN_ID: &str = "pedestrian";

const CAR_START: (f64, f64) = (-14.53, -0.11);
const PEDESTRIAN_START: (f64, f64) = (-0.70, -7.22);

/// What the car did this step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarAction {
    Start,
    Wait,
    SlowDown,
    /// Moving on green before ever having stopped.
    AdvanceFirst,
    /// Counting down the reaction delay on green.
    Reaction,
    /// Moving off on green; the car is released from this step on.
    Advance,
    /// Cruising after release.
    Continue,
    Reset,
}

impl CarAction {
    pub fn wire_name(self) -> &'static str {
        match self {
            CarAction::Start => "INICIO",
            CarAction::Wait => "ESPERA",
            CarAction::SlowDown => "DISMINUYE",
            CarAction::AdvanceFirst => "AVANZA_INICIO",
            CarAction::Reaction => "REACTION",
            CarAction::Advance => "AVANZA",
            CarAction::Continue => "CONTINUA",
            CarAction::Reset => RESET_ACTION,
        }
    }
}

/// What the pedestrian did this step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PedestrianAction {
    Start,
    Wait,
    Crossing,
    /// Still walking after reaching the far side.
    Continue,
    Reset,
}

impl PedestrianAction {
    pub fn wire_name(self) -> &'static str {
        match self {
            PedestrianAction::Start => "INICIO",
            PedestrianAction::Wait => "ESPERA",
            PedestrianAction::Crossing => "CRUZA",
            PedestrianAction::Continue => "SIGUE",
            PedestrianAction::Reset => RESET_ACTION,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Car {
    pub x: f64,
    pub z: f64,
    v_green: f64,
    v_amber: f64,
    released: bool,
    was_stopped_once: bool,
    reaction_delay: u32,
    reaction_counter: u32,
}

impl Car {
    pub fn new(params: &SimParams) -> Self {
        Self {
            x: CAR_START.0,
            z: CAR_START.1,
            v_green: params.car_speed,
            v_amber: params.car_speed * params.amber_factor,
            released: false,
            was_stopped_once: false,
            reaction_delay: params.reaction_delay_steps,
            reaction_counter: 0,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn step(&mut self, light: LightColor) -> CarAction {
        if self.released {
            self.x += self.v_green;
            return CarAction::Continue;
        }
        match light {
            LightColor::Red => {
                self.reaction_counter = 0;
                self.was_stopped_once = true;
                CarAction::Wait
            }
            LightColor::Amber => {
                self.reaction_counter = 0;
                self.x += self.v_amber;
                CarAction::SlowDown
            }
            LightColor::Green if !self.was_stopped_once => {
                self.x += self.v_green;
                CarAction::AdvanceFirst
            }
            LightColor::Green if self.reaction_counter < self.reaction_delay => {
                self.reaction_counter += 1;
                CarAction::Reaction
            }
            LightColor::Green => {
                self.x += self.v_green;
                self.released = true;
                info!("car released; it will not brake again");
                CarAction::Advance
            }
        }
    }

    pub fn reset(&mut self) {
        self.x = CAR_START.0;
        self.z = CAR_START.1;
        self.released = false;
        self.was_stopped_once = false;
        self.reaction_counter = 0;
    }

    pub fn report(&self, action: CarAction, step: i64) -> Message {
        Message::state(CAR_ID, self.x, self.z)
            .with_action(action.wire_name())
            .with_step(step)
    }
}

#[derive(Clone, Debug)]
pub struct Pedestrian {
    pub x: f64,
    pub z: f64,
    speed: f64,
    end_z: f64,
    started_crossing: bool,
    finished: bool,
}

impl Pedestrian {
    pub fn new(params: &SimParams) -> Self {
        Self {
            x: PEDESTRIAN_START.0,
            z: PEDESTRIAN_START.1,
            speed: params.ped_speed,
            end_z: params.ped_end_z,
            started_crossing: false,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn step(&mut self, light: LightColor) -> PedestrianAction {
        if !self.started_crossing && light == LightColor::Red {
            self.started_crossing = true;
            info!("pedestrian starts crossing");
        }
        if !self.started_crossing {
            return PedestrianAction::Wait;
        }

        self.z += self.speed;
        if !self.finished && self.z >= self.end_z {
            self.finished = true;
            info!(z = self.z, "pedestrian finished crossing");
        }
        if self.finished {
            PedestrianAction::Continue
        } else {
            PedestrianAction::Crossing
        }
    }

    pub fn reset(&mut self) {
        self.x = PEDESTRIAN_START.0;
        self.z = PEDESTRIAN_START.1;
        self.started_crossing = false;
        self.finished = false;
    }

    pub fn report(&self, action: PedestrianAction, step: i64) -> Message {
        Message::state(PEDESTRIAN_ID, self.x, self.z)
            .with_action(action.wire_name())
            .with_step(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LightColor::{Amber, Green, Red};

    fn params() -> SimParams {
        SimParams::default()
    }

    #[test]
    fn car_advances_on_green_before_first_stop() {
        let mut car = Car::new(&params());
        assert_eq!(car.step(Green), CarAction::AdvanceFirst);
        assert_eq!(car.x, CAR_START.0 + 1.0);
        assert!(!car.is_released());
    }

    #[test]
    fn car_slows_on_amber_and_stops_on_red() {
        let mut car = Car::new(&params());
        assert_eq!(car.step(Amber), CarAction::SlowDown);
        assert_eq!(car.x, CAR_START.0 + 0.5);
        let x = car.x;
        assert_eq!(car.step(Red), CarAction::Wait);
        assert_eq!(car.step(Red), CarAction::Wait);
        assert_eq!(car.x, x);
    }

    #[test]
    fn car_reacts_then_is_released_after_stopping() {
        let mut car = Car::new(&params());
        car.step(Red);
        let x = car.x;
        assert_eq!(car.step(Green), CarAction::Reaction);
        assert_eq!(car.x, x);
        assert_eq!(car.step(Green), CarAction::Advance);
        assert!(car.is_released());
        // Released cars ignore the light.
        assert_eq!(car.step(Red), CarAction::Continue);
        assert_eq!(car.x, x + 2.0);
    }

    #[test]
    fn amber_interrupts_reaction_countdown() {
        let mut car = Car::new(&SimParams {
            reaction_delay_steps: 2,
            ..params()
        });
        car.step(Red);
        assert_eq!(car.step(Green), CarAction::Reaction);
        assert_eq!(car.step(Amber), CarAction::SlowDown);
        assert_eq!(car.step(Green), CarAction::Reaction);
        assert_eq!(car.step(Green), CarAction::Reaction);
        assert_eq!(car.step(Green), CarAction::Advance);
    }

    #[test]
    fn car_reset_requires_new_release() {
        let mut car = Car::new(&params());
        car.step(Red);
        car.step(Green);
        car.step(Green);
        assert!(car.is_released());
        car.reset();
        assert!(!car.is_released());
        assert_eq!((car.x, car.z), CAR_START);
        assert_eq!(car.step(Green), CarAction::AdvanceFirst);
    }

    #[test]
    fn pedestrian_waits_for_red_then_never_stops() {
        let mut ped = Pedestrian::new(&params());
        assert_eq!(ped.step(Green), PedestrianAction::Wait);
        assert_eq!(ped.step(Amber), PedestrianAction::Wait);
        assert_eq!(ped.z, PEDESTRIAN_START.1);
        assert_eq!(ped.step(Red), PedestrianAction::Crossing);
        assert_eq!(ped.step(Green), PedestrianAction::Crossing);
        assert!(ped.z > PEDESTRIAN_START.1);
    }

    #[test]
    fn pedestrian_finishes_at_end_z_and_keeps_walking() {
        let mut ped = Pedestrian::new(&params());
        let mut actions = Vec::new();
        while !ped.is_finished() {
            actions.push(ped.step(Red));
        }
        // From -7.22 at 1.0 per step, z first reaches 6.0 on step 14.
        assert_eq!(actions.len(), 14);
        assert_eq!(actions.last(), Some(&PedestrianAction::Continue));
        let z = ped.z;
        assert_eq!(ped.step(Green), PedestrianAction::Continue);
        assert!(ped.z > z);
    }

    #[test]
    fn reports_carry_reset_token() {
        let car = Car::new(&params());
        let msg = car.report(CarAction::Reset, 60);
        assert!(msg.is_reset());
        assert_eq!(msg.agent_id.as_deref(), Some(CAR_ID));
        assert_eq!(msg.step, Some(60));
        let ped = Pedestrian::new(&params());
        assert!(ped.report(PedestrianAction::Reset, 60).is_reset());
        assert_eq!(
            ped.report(PedestrianAction::Crossing, 3).action.as_deref(),
            Some("CRUZA")
        );
    }
}
