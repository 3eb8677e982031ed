//! Built-in themes and the role deal.
//!
//! A theme only changes presentation: role names, descriptions, colors and
//! the canned narration used when the narrator service is slow or down.
//! Every theme deals the same role mix.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Alignment, GameError, Power, Role};

/// Id of the theme used when a host does not pick one.
pub const DEFAULT_THEME: &str = "village";

/// Presentation of one role inside a theme.
#[derive(Debug, PartialEq, Eq)]
pub struct RoleTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

/// A set of role names and canned narration.
///
/// Narration strings may contain `{name}` and `{role}`, replaced with the
/// affected player's display name and role name.
#[derive(Debug, PartialEq, Eq)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    pub min_players: usize,
    pub killer: RoleTemplate,
    pub healer: RoleTemplate,
    pub investigator: RoleTemplate,
    pub citizen: RoleTemplate,
    pub intro: &'static str,
    pub night_death: &'static str,
    pub night_saved: &'static str,
    pub day_death: &'static str,
    pub good_wins: &'static str,
    pub evil_wins: &'static str,
}

static THEMES: [Theme; 3] = [
    Theme {
        id: "village",
        name: "The Village",
        min_players: 4,
        killer: RoleTemplate {
            name: "Werewolf",
            description: "Each night, agree with the pack on one villager to devour.",
            color: "#b91c1c",
        },
        healer: RoleTemplate {
            name: "Healer",
            description: "Each night, choose one villager to protect from harm.",
            color: "#15803d",
        },
        investigator: RoleTemplate {
            name: "Seer",
            description: "Each night, learn whether one villager is a werewolf.",
            color: "#7c3aed",
        },
        citizen: RoleTemplate {
            name: "Villager",
            description: "Find the werewolves and vote them out by day.",
            color: "#a16207",
        },
        intro: "Fog settles over the village. Somewhere among you, the wolves are waiting for dark.",
        night_death: "Dawn breaks. {name} was found at the edge of the woods. They were the {role}.",
        night_saved: "Dawn breaks. The wolves struck at {name}, but the healer got there first.",
        day_death: "The village has spoken. {name} is driven out. They were the {role}.",
        good_wins: "The last werewolf has fallen. The village is safe.",
        evil_wins: "The wolves now outnumber the villagers. The village is lost.",
    },
    Theme {
        id: "starship",
        name: "Starship Meridian",
        min_players: 5,
        killer: RoleTemplate {
            name: "Saboteur",
            description: "Each night cycle, coordinate with your cell to vent one crew member.",
            color: "#dc2626",
        },
        healer: RoleTemplate {
            name: "Medic",
            description: "Each night cycle, keep one crew member in the medbay.",
            color: "#0d9488",
        },
        investigator: RoleTemplate {
            name: "Security Officer",
            description: "Each night cycle, scan one crew member's loyalty.",
            color: "#2563eb",
        },
        citizen: RoleTemplate {
            name: "Crew",
            description: "Find the saboteurs and lock them in the brig.",
            color: "#64748b",
        },
        intro: "Three weeks out from port, the Meridian's logs show someone has been disabling the alarms.",
        night_death: "Shift change. {name} is missing, and airlock four cycled overnight. They were the {role}.",
        night_saved: "Shift change. {name} was attacked in the corridor but pulled through in the medbay.",
        day_death: "The crew votes. {name} is sealed in the brig. They were the {role}.",
        good_wins: "Every saboteur is in the brig. The Meridian flies on.",
        evil_wins: "The saboteurs hold the bridge. The Meridian goes dark.",
    },
    Theme {
        id: "masquerade",
        name: "The Masquerade",
        min_players: 6,
        killer: RoleTemplate {
            name: "Assassin",
            description: "Each night, choose with your conspirators which guest will not see midnight.",
            color: "#9f1239",
        },
        healer: RoleTemplate {
            name: "Physician",
            description: "Each night, tend to one guest and keep them from poison.",
            color: "#047857",
        },
        investigator: RoleTemplate {
            name: "Inspector",
            description: "Each night, look behind one guest's mask.",
            color: "#1d4ed8",
        },
        citizen: RoleTemplate {
            name: "Guest",
            description: "Unmask the assassins before the ball is over.",
            color: "#b45309",
        },
        intro: "The doors of the manor close behind the last guest. Not everyone behind a mask is here to dance.",
        night_death: "The music stops. {name} lies still beneath the chandelier. They were the {role}.",
        night_saved: "The music stops. {name} staggers, poisoned, but the physician's antidote holds.",
        day_death: "The guests demand it. {name} is unmasked and shown the door. They were the {role}.",
        good_wins: "The last assassin is unmasked. The ball goes on.",
        evil_wins: "By dawn the assassins are the only ones still dancing.",
    },
];

/// All built-in themes.
pub fn themes() -> &'static [Theme] {
    &THEMES
}

/// Looks a theme up by id, case-insensitively.
pub fn find_theme(id: &str) -> Result<&'static Theme, GameError> {
    THEMES
        .iter()
        .find(|t| t.id.eq_ignore_ascii_case(id.trim()))
        .ok_or_else(|| GameError::UnknownTheme(id.to_string()))
}

impl Theme {
    /// Deals roles for `players` seats in random order.
    ///
    /// The mix is `max(1, players / 4)` killers, one healer, one
    /// investigator and citizens for every remaining seat.
    pub fn deal<R: Rng + ?Sized>(
        &self,
        players: usize,
        rng: &mut R,
    ) -> Result<Vec<Role>, GameError> {
        if players < self.min_players {
            return Err(GameError::ThemeTooSmall {
                theme: self.id,
                have: players,
                need: self.min_players,
            });
        }

        let killers = (players / 4).max(1);
        let mut roles = Vec::with_capacity(players);
        roles.extend((0..killers).map(|_| self.role(Power::Kill)));
        roles.push(self.role(Power::Heal));
        roles.push(self.role(Power::Investigate));
        while roles.len() < players {
            roles.push(self.role(Power::Citizen));
        }

        roles.shuffle(rng);
        Ok(roles)
    }

    /// Builds the role for `power` from this theme's template.
    pub fn role(&self, power: Power) -> Role {
        let (template, alignment) = match power {
            Power::Kill => (&self.killer, Alignment::Evil),
            Power::Heal => (&self.healer, Alignment::Good),
            Power::Investigate => (&self.investigator, Alignment::Good),
            Power::Citizen => (&self.citizen, Alignment::Good),
        };
        Role {
            name: template.name.to_string(),
            alignment,
            power,
            description: template.description.to_string(),
            color: template.color.to_string(),
        }
    }

    pub fn win_text(&self, winner: Alignment) -> &'static str {
        match winner {
            Alignment::Good => self.good_wins,
            Alignment::Evil => self.evil_wins,
        }
    }
}
