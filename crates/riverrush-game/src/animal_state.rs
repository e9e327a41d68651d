//! Per-animal state machine.
//!
//! ```text
//! OnBoat ──jump──▶ InAir ──drop──▶ OnBoat
//!    │
//!    └──collide──▶ InWater ──return_to_boat──▶ OnBoat
//! ```
//!
//! Every other operation leaves the state as it is.

use riverrush_protocol::{AnimalId, Event};

#[derive(Debug, Clone, PartialEq)]
pub enum AnimalEffect {
    Emit(Event),
    /// Run the presentation's hit reaction for this animal.
    Hit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimalStep {
    pub state: AnimalState,
    pub effects: Vec<AnimalEffect>,
}

impl AnimalStep {
    fn stay(state: AnimalState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AnimalState {
    #[default]
    OnBoat,
    InAir,
    InWater,
}

impl AnimalState {
    pub fn jump(self, _animal: AnimalId) -> AnimalStep {
        match self {
            Self::OnBoat => AnimalStep::stay(Self::InAir),
            _ => AnimalStep::stay(self),
        }
    }

    pub fn drop(self, _animal: AnimalId) -> AnimalStep {
        match self {
            Self::InAir => AnimalStep::stay(Self::OnBoat),
            _ => AnimalStep::stay(self),
        }
    }

    /// An animal on the boat that gets hit falls into the water. Animals
    /// in the air fly over the obstacle.
    pub fn collide(self, animal: AnimalId) -> AnimalStep {
        match self {
            Self::OnBoat => AnimalStep {
                state: Self::InWater,
                effects: vec![
                    AnimalEffect::Hit,
                    AnimalEffect::Emit(Event::AnimalFellOff { animal }),
                ],
            },
            _ => AnimalStep::stay(self),
        }
    }

    pub fn return_to_boat(self, animal: AnimalId) -> AnimalStep {
        match self {
            Self::InWater => AnimalStep {
                state: Self::OnBoat,
                effects: vec![AnimalEffect::Emit(Event::AnimalReturned { animal })],
            },
            _ => AnimalStep::stay(self),
        }
    }
}

impl std::fmt::Display for AnimalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnBoat => write!(f, "OnBoat"),
            Self::InAir => write!(f, "InAir"),
            Self::InWater => write!(f, "InWater"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: AnimalId = AnimalId(7);

    #[test]
    fn test_jump_and_drop_cycle() {
        let step = AnimalState::OnBoat.jump(A);
        assert_eq!(step.state, AnimalState::InAir);
        assert!(step.effects.is_empty());

        let step = step.state.drop(A);
        assert_eq!(step.state, AnimalState::OnBoat);
        assert!(step.effects.is_empty());
    }

    #[test]
    fn test_collide_on_boat_falls_off_once() {
        let step = AnimalState::OnBoat.collide(A);
        assert_eq!(step.state, AnimalState::InWater);
        assert_eq!(
            step.effects,
            vec![
                AnimalEffect::Hit,
                AnimalEffect::Emit(Event::AnimalFellOff { animal: A }),
            ]
        );
    }

    #[test]
    fn test_in_air_ignores_everything_but_drop() {
        for step in [
            AnimalState::InAir.jump(A),
            AnimalState::InAir.collide(A),
            AnimalState::InAir.return_to_boat(A),
        ] {
            assert_eq!(step, AnimalStep::stay(AnimalState::InAir));
        }
    }

    #[test]
    fn test_on_boat_ignores_drop_and_return() {
        assert_eq!(AnimalState::OnBoat.drop(A), AnimalStep::stay(AnimalState::OnBoat));
        assert_eq!(
            AnimalState::OnBoat.return_to_boat(A),
            AnimalStep::stay(AnimalState::OnBoat)
        );
    }

    #[test]
    fn test_in_water_only_returns_to_boat() {
        for step in [
            AnimalState::InWater.jump(A),
            AnimalState::InWater.drop(A),
            AnimalState::InWater.collide(A),
        ] {
            assert_eq!(step, AnimalStep::stay(AnimalState::InWater));
        }

        let step = AnimalState::InWater.return_to_boat(A);
        assert_eq!(step.state, AnimalState::OnBoat);
        assert_eq!(
            step.effects,
            vec![AnimalEffect::Emit(Event::AnimalReturned { animal: A })]
        );
    }

    #[test]
    fn test_default_is_on_boat() {
        assert_eq!(AnimalState::default(), AnimalState::OnBoat);
        assert_eq!(AnimalState::InWater.to_string(), "InWater");
    }
}
