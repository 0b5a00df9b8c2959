use super::reuse::ReuseCursor;
use crate::language::StateId;
use crate::point::Length;
use crate::scanner::ScannerState;
use crate::tree::subtree::Subtree;

#[derive(Clone)]
pub(super) struct StackEntry {
    pub state: StateId,
    /// `None` only for the bottom entry.
    pub subtree: Option<Subtree>,
    /// Byte position after this entry.
    pub end: Length,
}

/// One hypothesis of the GLR parse: its own stack, lookahead and
/// recovery bookkeeping.
#[derive(Clone)]
pub(super) struct Version {
    pub stack: Vec<StackEntry>,
    /// Token (or reused node) starting at `position`, once fetched.
    pub lookahead: Option<Subtree>,
    /// End of everything consumed, including skipped tokens.
    pub position: Length,
    pub error_cost: u32,
    pub dynamic_precedence: i32,
    pub external_state: ScannerState,
    pub after_extra: bool,
    /// Tokens skipped since the last error, not yet wrapped in an ERROR.
    pub pending: Vec<Subtree>,
    pub pending_cost: u32,
    pub recovered_at: Option<usize>,
    pub missing_at: Option<usize>,
    pub reuse: Option<ReuseCursor>,
    /// Reductions since input was last consumed.
    pub reductions: u32,
    pub halted: bool,
}

impl Version {
    pub(super) fn new(reuse: Option<ReuseCursor>) -> Self {
        Self {
            stack: vec![StackEntry {
                state: 0,
                subtree: None,
                end: Length::ZERO,
            }],
            lookahead: None,
            position: Length::ZERO,
            error_cost: 0,
            dynamic_precedence: 0,
            external_state: ScannerState::default(),
            after_extra: false,
            pending: Vec::new(),
            pending_cost: 0,
            recovered_at: None,
            missing_at: None,
            reuse,
            reductions: 0,
            halted: false,
        }
    }

    pub(super) fn state(&self) -> StateId {
        self.stack.last().map_or(0, |entry| entry.state)
    }

    fn top_end(&self) -> Length {
        self.stack.last().map_or(Length::ZERO, |entry| entry.end)
    }

    /// Pushes a subtree that ends up in `state`.
    pub(super) fn push(&mut self, state: StateId, subtree: Subtree) {
        let end = self.top_end() + subtree.size;
        if let Some(external) = &subtree.last_external {
            self.external_state = external.clone();
        }
        self.stack.push(StackEntry {
            state,
            subtree: Some(subtree),
            end,
        });
    }

    /// Pops entries above the bottom, most recent last.
    pub(super) fn pop(&mut self, count: usize) -> Vec<Subtree> {
        let keep = self.stack.len().saturating_sub(count).max(1);
        self.stack
            .split_off(keep)
            .into_iter()
            .filter_map(|entry| entry.subtree)
            .collect()
    }

    /// Every subtree on the stack, bottom first.
    pub(super) fn subtrees(&self) -> Vec<Subtree> {
        self.stack
            .iter()
            .filter_map(|entry| entry.subtree.clone())
            .collect()
    }

    /// Whether the two versions would behave identically from here on.
    pub(super) fn can_merge(&self, other: &Self) -> bool {
        self.position.bytes == other.position.bytes
            && self.pending.is_empty()
            && other.pending.is_empty()
            && self.after_extra == other.after_extra
            && self.external_state == other.external_state
            && self.stack.len() == other.stack.len()
            && self
                .stack
                .iter()
                .zip(&other.stack)
                .all(|(a, b)| a.state == b.state)
    }

    /// Lower error cost wins, then higher dynamic precedence.
    pub(super) fn is_better_than(&self, other: &Self) -> bool {
        (self.error_cost, -self.dynamic_precedence) < (other.error_cost, -other.dynamic_precedence)
    }
}
