//! Process-wide action toggles read by the scheduler.
//!
//! Writes are rare full-value replacements of independent booleans, so
//! each flag is its own atomic; readers take a [`FlagSnapshot`] once per
//! tick and never observe a half-applied update of a single flag.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::AppError;

/// One of the four action toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFlag {
    /// Walk forward in random bursts (`walk`).
    Movement,
    /// Walk forward while sprinting (`run`).
    Sprint,
    /// Attack the nearest player (`fight`).
    Combat,
    /// Occasionally send random chat (`spam`).
    ChatSpam,
}

impl ActionFlag {
    /// All flags in display order.
    pub const ALL: [ActionFlag; 4] = [Self::Movement, Self::Sprint, Self::Combat, Self::ChatSpam];

    /// Console keyword for this flag.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Movement => "walk",
            Self::Sprint => "run",
            Self::Combat => "fight",
            Self::ChatSpam => "spam",
        }
    }
}

impl FromStr for ActionFlag {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "walk" | "movement" => Ok(Self::Movement),
            "run" | "sprint" => Ok(Self::Sprint),
            "fight" | "combat" => Ok(Self::Combat),
            "spam" | "chat_spam" => Ok(Self::ChatSpam),
            other => Err(AppError::InvalidCommand(format!("unknown action '{other}'"))),
        }
    }
}

impl Display for ActionFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Immutable copy of the flags taken at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlagSnapshot {
    /// Walk forward in random bursts.
    pub movement: bool,
    /// Sprint during the burst.
    pub sprint: bool,
    /// Attack the nearest player.
    pub combat: bool,
    /// Occasionally send random chat.
    pub chat_spam: bool,
}

impl FlagSnapshot {
    /// Whether a movement window should be opened this tick.
    #[must_use]
    pub fn wants_movement(&self) -> bool {
        self.movement || self.sprint
    }

    /// Whether any action is enabled.
    #[must_use]
    pub fn any(&self) -> bool {
        self.movement || self.sprint || self.combat || self.chat_spam
    }
}

/// Shared action toggles; all off at startup.
#[derive(Debug, Default)]
pub struct ActionFlags {
    movement: AtomicBool,
    sprint: AtomicBool,
    combat: AtomicBool,
    chat_spam: AtomicBool,
}

impl ActionFlags {
    /// Create with every flag off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, flag: ActionFlag) -> &AtomicBool {
        match flag {
            ActionFlag::Movement => &self.movement,
            ActionFlag::Sprint => &self.sprint,
            ActionFlag::Combat => &self.combat,
            ActionFlag::ChatSpam => &self.chat_spam,
        }
    }

    /// Set one flag, returning its previous value.
    pub fn set(&self, flag: ActionFlag, on: bool) -> bool {
        self.cell(flag).swap(on, Ordering::SeqCst)
    }

    /// Read one flag.
    #[must_use]
    pub fn get(&self, flag: ActionFlag) -> bool {
        self.cell(flag).load(Ordering::SeqCst)
    }

    /// Take an immutable snapshot of all flags.
    #[must_use]
    pub fn snapshot(&self) -> FlagSnapshot {
        FlagSnapshot {
            movement: self.get(ActionFlag::Movement),
            sprint: self.get(ActionFlag::Sprint),
            combat: self.get(ActionFlag::Combat),
            chat_spam: self.get(ActionFlag::ChatSpam),
        }
    }
}
