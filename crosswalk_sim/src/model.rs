// The crossing model: a traffic light, a car, and a pedestrian advanced in
// lock step.
//
// `CrossModel` is pure: it owns no socket and never sleeps. Each `step()`
// returns the messages that step produced, in the order they must be sent:
// the light first, then the car, then the pedestrian. Reading the light
// before the agents move is what lets them react to the phase of the same
// step.
//
// When `reset_every` is non-zero, every step that is a multiple of it (but
// not step 0) is followed by a reset: all three agents return to their
// starting state and report it, the agents with the reset action token so
// the host can snap its entities back.

use crosswalk_protocol::{LightColor, Message};
use tracing::info;

use crate::agents::{Car, CarAction, Pedestrian, PedestrianAction};
use crate::light::TrafficLight;
use crate::params::SimParams;

pub struct CrossModel {
    params: SimParams,
    light: TrafficLight,
    car: Car,
    pedestrian: Pedestrian,
    t: u64,
}

impl CrossModel {
    pub fn new(params: SimParams) -> Self {
        Self {
            light: TrafficLight::new(&params),
            car: Car::new(&params),
            pedestrian: Pedestrian::new(&params),
            params,
            t: 0,
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Steps taken so far.
    pub fn t(&self) -> u64 {
        self.t
    }

    pub fn is_finished(&self) -> bool {
        self.t >= self.params.steps
    }

    pub fn light(&self) -> LightColor {
        self.light.phase()
    }

    pub fn car(&self) -> &Car {
        &self.car
    }

    pub fn pedestrian(&self) -> &Pedestrian {
        &self.pedestrian
    }

    /// The agents' starting positions, sent once before the first step.
    pub fn initial_messages(&self) -> Vec<Message> {
        vec![
            self.car.report(CarAction::Start, 0),
            self.pedestrian.report(PedestrianAction::Start, 0),
        ]
    }

    pub fn step(&mut self) -> Vec<Message> {
        self.t += 1;
        let step = self.t as i64;

        let phase = self.light.step(self.pedestrian.is_finished());
        let car_action = self.car.step(phase);
        let ped_action = self.pedestrian.step(phase);

        let mut out = vec![
            Message::light(phase.as_str()).with_step(step),
            self.car.report(car_action, step),
            self.pedestrian.report(ped_action, step),
        ];

        if self.params.reset_every > 0 && self.t % self.params.reset_every == 0 {
            info!(step = self.t, "scheduled reset");
            out.extend(self.reset(step));
        }
        out
    }

    fn reset(&mut self, step: i64) -> [Message; 3] {
        self.light.reset();
        self.car.reset();
        self.pedestrian.reset();
        [
            Message::light(self.light.phase().as_str()).with_step(step),
            self.car.report(CarAction::Reset, step),
            self.pedestrian.report(PedestrianAction::Reset, step),
        ]
    }
}

#[cfg(test)]
mod tests {
    use crosswalk_protocol::MessageKind;

    use super::*;
    use crate::agents::{CAR_ID, PEDESTRIAN_ID};

    fn model(params: SimParams) -> CrossModel {
        CrossModel::new(params)
    }

    #[test]
    fn initial_messages_report_start_positions() {
        let m = model(SimParams::default());
        let msgs = m.initial_messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].agent_id.as_deref(), Some(CAR_ID));
        assert_eq!(msgs[0].action.as_deref(), Some("INICIO"));
        assert_eq!(msgs[1].agent_id.as_deref(), Some(PEDESTRIAN_ID));
        assert!(msgs.iter().all(|m| m.step == Some(0)));
    }

    #[test]
    fn step_emits_light_car_pedestrian_in_order() {
        let mut m = model(SimParams::default());
        let msgs = m.step();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].kind, MessageKind::Light);
        assert_eq!(msgs[0].light_state.as_deref(), Some("GREEN"));
        assert_eq!(msgs[1].agent_id.as_deref(), Some(CAR_ID));
        assert_eq!(msgs[2].agent_id.as_deref(), Some(PEDESTRIAN_ID));
        assert!(msgs.iter().all(|m| m.step == Some(1)));
        assert_eq!(m.t(), 1);
    }

    #[test]
    fn pedestrian_crosses_only_after_red() {
        let mut m = model(SimParams::default());
        let mut first_cross = None;
        for _ in 0..20 {
            let msgs = m.step();
            if msgs[2].action.as_deref() == Some("CRUZA") {
                first_cross = Some((m.t(), msgs[0].light_state.clone()));
                break;
            }
        }
        let (t, light) = first_cross.unwrap();
        assert_eq!(t, 10);
        assert_eq!(light.as_deref(), Some("RED"));
    }

    #[test]
    fn car_stops_on_red_then_gets_released() {
        let mut m = model(SimParams::default());
        let mut saw_wait = false;
        for _ in 0..59 {
            m.step();
            if m.light() == LightColor::Red && !m.car().is_released() {
                saw_wait = true;
            }
        }
        assert!(saw_wait);
        assert!(m.car().is_released());
        assert!(m.pedestrian().is_finished());
    }

    #[test]
    fn reset_appends_reset_messages() {
        let mut m = model(SimParams {
            reset_every: 5,
            ..SimParams::default()
        });
        for _ in 0..4 {
            assert_eq!(m.step().len(), 3);
        }
        let msgs = m.step();
        assert_eq!(msgs.len(), 6);
        assert_eq!(msgs[3].light_state.as_deref(), Some("GREEN"));
        assert!(msgs[4].is_reset());
        assert!(msgs[5].is_reset());
        assert!(msgs[3..].iter().all(|m| m.step == Some(5)));
        assert_eq!(m.car().x, msgs[4].x.unwrap());
        assert_eq!(msgs[4].x, Some(-14.53));
    }

    #[test]
    fn zero_reset_every_never_resets() {
        let mut m = model(SimParams {
            reset_every: 0,
            ..SimParams::default()
        });
        for _ in 0..200 {
            assert!(m.step().iter().all(|msg| !msg.is_reset()));
        }
    }

    #[test]
    fn finishes_after_configured_steps() {
        let mut m = model(SimParams {
            steps: 3,
            ..SimParams::default()
        });
        let mut n = 0;
        while !m.is_finished() {
            m.step();
            n += 1;
        }
        assert_eq!(n, 3);
    }
}
