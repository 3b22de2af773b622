use dmscreen_core::{EnvelopeError, GameSystem, InitiativeEntry, InitiativeList, SyncMessage};

/// What a received message did to the local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The list was replaced. `appended` asks the renderer to animate the
    /// last entry as newly arrived.
    Initiative { appended: bool, len: usize },
    Game { previous: GameSystem },
    Ignored,
}

/// Everything a screen mirrors from its peers.
///
/// Owned by whoever renders it. It changes through exactly two doors: the
/// local mutators below, which return the full snapshot to broadcast, and
/// [`ScreenState::apply`] for snapshots received from the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenState {
    initiative: InitiativeList,
    game: GameSystem,
}

impl ScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game(game: GameSystem) -> Self {
        Self {
            game,
            ..Self::default()
        }
    }

    pub fn initiative(&self) -> &InitiativeList {
        &self.initiative
    }

    pub fn game(&self) -> &GameSystem {
        &self.game
    }

    pub fn add_combatant(&mut self, entry: InitiativeEntry) -> SyncMessage {
        self.initiative.push(entry);
        SyncMessage::initiative(&self.initiative)
    }

    pub fn sort_initiative(&mut self) -> SyncMessage {
        self.initiative.sort_by_roll();
        SyncMessage::initiative(&self.initiative)
    }

    pub fn clear_initiative(&mut self) -> SyncMessage {
        self.initiative.clear();
        SyncMessage::initiative(&self.initiative)
    }

    pub fn select_game(&mut self, game: GameSystem) -> SyncMessage {
        self.game = game.clone();
        SyncMessage::game(game)
    }

    pub fn apply(&mut self, message: SyncMessage) -> Applied {
        match message {
            SyncMessage::InitiativeUpdate(entries) => {
                let replaced = self.initiative.replace(entries);
                Applied::Initiative {
                    appended: replaced.appended,
                    len: replaced.current_len,
                }
            }
            SyncMessage::GameChange(game) => Applied::Game {
                previous: std::mem::replace(&mut self.game, game),
            },
            SyncMessage::Unknown { .. } => Applied::Ignored,
        }
    }

    /// Decodes a raw frame and applies it. A frame that fails to decode
    /// leaves the state untouched.
    pub fn receive(&mut self, raw: &str) -> Result<Applied, EnvelopeError> {
        let message = SyncMessage::decode(raw)?;
        Ok(self.apply(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, roll: i64) -> InitiativeEntry {
        InitiativeEntry::new(name, roll, "fa-bat").unwrap()
    }

    #[test]
    fn first_snapshot_is_an_append() {
        let mut state = ScreenState::new();
        let applied = state
            .receive(
                r#"{"type":"initiative-update","payload":[{"name":"Mina","roll":17,"iconClass":"fa-bat"}]}"#,
            )
            .unwrap();
        assert_eq!(applied, Applied::Initiative { appended: true, len: 1 });
        assert_eq!(state.initiative().entries(), &[entry("Mina", 17)]);
    }

    #[test]
    fn shorter_or_reordered_snapshots_replace_without_append() {
        let mut state = ScreenState::new();
        state.add_combatant(entry("a", 3));
        state.add_combatant(entry("b", 9));
        state.add_combatant(entry("c", 1));

        let shorter = vec![entry("x", 4)];
        let applied = state.apply(SyncMessage::InitiativeUpdate(shorter.clone()));
        assert_eq!(applied, Applied::Initiative { appended: false, len: 1 });
        assert_eq!(state.initiative().entries(), shorter.as_slice());

        let applied = state.apply(SyncMessage::InitiativeUpdate(Vec::new()));
        assert_eq!(applied, Applied::Initiative { appended: false, len: 0 });
        assert!(state.initiative().is_empty());
    }

    #[test]
    fn host_mutations_emit_full_snapshots() {
        let mut host = ScreenState::new();
        host.add_combatant(entry("a", 3));
        host.add_combatant(entry("b", 9));
        let sorted = host.sort_initiative();
        assert_eq!(
            sorted,
            SyncMessage::InitiativeUpdate(vec![entry("b", 9), entry("a", 3)])
        );

        let mut player = ScreenState::new();
        player.apply(host.add_combatant(entry("c", 5)));
        assert_eq!(player.initiative(), host.initiative());

        // Sorting never grows the list, so it never animates.
        let applied = player.apply(host.sort_initiative());
        assert_eq!(applied, Applied::Initiative { appended: false, len: 3 });
        assert_eq!(host.clear_initiative(), SyncMessage::InitiativeUpdate(Vec::new()));
    }

    #[test]
    fn game_changes_apply_in_receipt_order() {
        let mut player = ScreenState::new();
        player.apply(SyncMessage::GameChange(GameSystem::from("D&D 5e")));
        assert_eq!(player.game(), &GameSystem::Dnd5e);
        let applied = player.apply(SyncMessage::GameChange(GameSystem::from("Dread Nights")));
        assert_eq!(applied, Applied::Game { previous: GameSystem::Dnd5e });
        assert_eq!(player.game(), &GameSystem::DreadNights);
    }

    #[test]
    fn bad_frames_leave_state_alone() {
        let mut state = ScreenState::new();
        state.add_combatant(entry("a", 3));
        let before = state.clone();

        assert!(state.receive("not json{{{").is_err());
        assert!(state
            .receive(r#"{"type":"initiative-update","payload":{"name":"a"}}"#)
            .is_err());
        assert_eq!(state, before);

        let ignored = state.receive(r#"{"type":"shop-open","payload":true}"#).unwrap();
        assert_eq!(ignored, Applied::Ignored);
        assert_eq!(state, before);
    }
}
