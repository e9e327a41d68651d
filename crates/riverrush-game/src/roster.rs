//! Team membership.

use std::collections::{BTreeMap, BTreeSet};

use riverrush_protocol::{AnimalId, TeamId};

use crate::GameError;

/// Read-only view of team sizes, used by the game state machine to decide
/// whether a round can start.
pub trait TeamRoster {
    /// Number of animals in each team.
    fn team_sizes(&self) -> Vec<usize>;

    /// Returns `true` when there is at least one team and every team has
    /// at least one animal.
    fn has_enough_animals(&self) -> bool {
        let sizes = self.team_sizes();
        !sizes.is_empty() && sizes.iter().all(|&n| n > 0)
    }
}

/// The animals of a session, grouped by team.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    teams: BTreeMap<TeamId, BTreeSet<AnimalId>>,
    max_per_team: usize,
}

impl Roster {
    /// Creates `team_count` empty teams, numbered from 0.
    pub fn new(team_count: usize, max_per_team: usize) -> Self {
        let teams = (0..team_count as u64)
            .map(|i| (TeamId(i), BTreeSet::new()))
            .collect();
        Self {
            teams,
            max_per_team,
        }
    }

    /// Puts `animal` into `team`.
    pub fn add(&mut self, animal: AnimalId, team: TeamId) -> Result<(), GameError> {
        if self.team_of(animal).is_some() {
            return Err(GameError::DuplicateAnimal(animal));
        }
        let members = self.teams.get_mut(&team).ok_or(GameError::UnknownTeam(team))?;
        if members.len() >= self.max_per_team {
            return Err(GameError::TeamFull(team));
        }
        members.insert(animal);
        Ok(())
    }

    /// Takes `animal` out of its team and returns the team it was in.
    pub fn remove(&mut self, animal: AnimalId) -> Result<TeamId, GameError> {
        let team = self.team_of(animal).ok_or(GameError::UnknownAnimal(animal))?;
        if let Some(members) = self.teams.get_mut(&team) {
            members.remove(&animal);
        }
        Ok(team)
    }

    /// The team `animal` belongs to.
    pub fn team_of(&self, animal: AnimalId) -> Option<TeamId> {
        self.teams
            .iter()
            .find(|(_, members)| members.contains(&animal))
            .map(|(team, _)| *team)
    }

    /// The team with the fewest animals that still has room. Ties go to
    /// the lowest team id.
    pub fn smallest_team(&self) -> Result<TeamId, GameError> {
        let (team, members) = self
            .teams
            .iter()
            .min_by_key(|(_, members)| members.len())
            .ok_or(GameError::NoTeams)?;
        if members.len() >= self.max_per_team {
            return Err(GameError::TeamFull(*team));
        }
        Ok(*team)
    }

    /// Animals of one team, in id order.
    pub fn animals(&self, team: TeamId) -> impl Iterator<Item = AnimalId> + '_ {
        self.teams.get(&team).into_iter().flatten().copied()
    }

    /// Team ids, in order.
    pub fn teams(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.teams.keys().copied()
    }

    /// Total animals across all teams.
    pub fn animal_count(&self) -> usize {
        self.teams.values().map(BTreeSet::len).sum()
    }
}

impl TeamRoster for Roster {
    fn team_sizes(&self) -> Vec<usize> {
        self.teams.values().map(BTreeSet::len).collect()
    }
}
