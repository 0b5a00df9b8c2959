use crate::scanner::ScannerState;
use crate::tree::subtree::Subtree;
use crate::tree::Tree;

#[derive(Clone)]
struct Frame {
    subtree: Subtree,
    start: usize,
    /// Index of the next child to visit once this frame is entered.
    child: usize,
}

/// Walks the previous tree in document order, offering subtrees that start
/// where the parser currently is.
#[derive(Clone)]
pub(super) struct ReuseCursor {
    /// The node under the cursor is the last frame; the frames below it are
    /// its ancestors.
    stack: Vec<Frame>,
    /// Scanner state after the last external token before the cursor.
    last_external: ScannerState,
}

impl ReuseCursor {
    pub(super) fn new(tree: &Tree) -> Self {
        Self {
            stack: vec![Frame {
                subtree: tree.root.clone(),
                start: 0,
                child: 0,
            }],
            last_external: ScannerState::default(),
        }
    }

    /// The subtree under the cursor and its start byte.
    pub(super) fn current(&self) -> Option<(&Subtree, usize)> {
        self.stack.last().map(|frame| (&frame.subtree, frame.start))
    }

    pub(super) fn last_external(&self) -> &ScannerState {
        &self.last_external
    }

    /// Moves past the current subtree to whatever follows it.
    pub(super) fn advance(&mut self) {
        let Some(done) = self.stack.pop() else {
            return;
        };
        if let Some(external) = &done.subtree.last_external {
            self.last_external = external.clone();
        }
        while let Some(parent) = self.stack.last_mut() {
            if let Some(next) = parent.subtree.children.get(parent.child) {
                let next = Frame {
                    subtree: next.subtree.clone(),
                    start: parent.start + next.offset.bytes,
                    child: 0,
                };
                parent.child += 1;
                self.stack.push(next);
                return;
            }
            self.stack.pop();
        }
    }

    /// Moves to the first child of the current subtree. Returns false for
    /// leaves, leaving the cursor where it was.
    pub(super) fn descend(&mut self) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        let Some(first) = frame.subtree.children.first() else {
            return false;
        };
        let child = Frame {
            subtree: first.subtree.clone(),
            start: frame.start,
            child: 0,
        };
        frame.child = 1;
        self.stack.push(child);
        true
    }
}
