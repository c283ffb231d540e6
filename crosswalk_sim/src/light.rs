// The traffic light's phase machine.
//
// GREEN -> AMBER -> RED on fixed step counts. RED is different: the light
// only returns to GREEN once it has been red for at least `min_red_steps`
// AND the pedestrian has finished crossing, so a slow pedestrian holds the
// light at red indefinitely.
//
// The phase counter counts steps spent in the current phase. A transition
// resets it to 0 and the step that performed the transition then counts as
// the first step of the new phase.

use crosswalk_protocol::LightColor;

use crate::params::SimParams;

#[derive(Clone, Debug)]
pub struct TrafficLight {
    phase: LightColor,
    counter: u32,
    green_steps: u32,
    amber_steps: u32,
    min_red_steps: u32,
}

impl TrafficLight {
    pub fn new(params: &SimParams) -> Self {
        Self {
            phase: LightColor::Green,
            counter: 0,
            green_steps: params.green_steps,
            amber_steps: params.amber_steps,
            min_red_steps: params.min_red_steps,
        }
    }

    pub fn phase(&self) -> LightColor {
        self.phase
    }

    /// Advance one step and return the phase for this step.
    pub fn step(&mut self, pedestrian_finished: bool) -> LightColor {
        let next = match self.phase {
            LightColor::Green if self.counter >= self.green_steps => Some(LightColor::Amber),
            LightColor::Amber if self.counter >= self.amber_steps => Some(LightColor::Red),
            LightColor::Red if self.counter >= self.min_red_steps && pedestrian_finished => {
                Some(LightColor::Green)
            }
            _ => None,
        };
        if let Some(phase) = next {
            self.phase = phase;
            self.counter = 0;
        }
        self.counter += 1;
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = LightColor::Green;
        self.counter = 0;
    }
}
