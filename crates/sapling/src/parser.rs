//! The GLR parsing engine.
//!
//! A parse runs one or more stack versions in lockstep over the input. Where
//! the table holds several actions, the version forks; versions that reach
//! the same state sequence at the same position merge, keeping the cheaper
//! one. Syntax errors fork too: a version may assume a missing token, pop
//! states until the lookahead fits and wrap what it popped in an ERROR node,
//! or skip the lookahead. Error cost decides which hypothesis survives.
//!
//! Given the edited previous tree, the parser reuses every unchanged subtree
//! whose parse and lex context still match, so work is proportional to the
//! edit rather than to the document.

mod reuse;
mod stack;

use crate::edit::{EditError, InputEdit};
use crate::language::{Language, ParseAction, ProductionId, StateId, END_SYMBOL};
use crate::lexer::{LexRequest, Lexer};
use crate::point::Point;
use crate::tree::subtree::{NodeSpec, Subtree, ERROR_LEX_STATE};
use crate::tree::Tree;
use reuse::ReuseCursor;
use stack::Version;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MAX_VERSIONS: usize = 6;
const ERROR_COST_PER_RECOVERY: u32 = 500;
const ERROR_COST_PER_MISSING_TREE: u32 = 110;
const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;
const MAX_COST_DIFFERENCE: u32 = 16 * ERROR_COST_PER_SKIPPED_TREE;
/// Reductions a version may perform without consuming input.
const MAX_REDUCTIONS_PER_POSITION: u32 = 4096;

/// Limits on a single parse.
///
/// A parse that hits a limit stops early and returns a partial tree for which
/// [`Tree::is_complete`] is false.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Maximum number of parser steps.
    pub max_operations: Option<u64>,
    /// Wall-clock instant after which the parse stops.
    pub deadline: Option<Instant>,
    /// Checked between steps; set it from another thread to cancel.
    pub cancellation: Option<Arc<AtomicBool>>,
}

impl ParseOptions {
    /// Stops parses that run longer than `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Stops parses after `operations` steps.
    #[must_use]
    pub fn with_max_operations(mut self, operations: u64) -> Self {
        self.max_operations = Some(operations);
        self
    }

    /// Stops parses once `flag` is set.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(flag);
        self
    }
}

/// Builds syntax trees for one language at a time.
///
/// A parser holds no per-document state; the same parser can parse any
/// number of documents, and trees outlive it.
#[derive(Debug, Default)]
pub struct Parser {
    language: Option<Language>,
    options: ParseOptions,
}

impl Parser {
    /// A parser with no language; [`Parser::parse`] returns `None` until one
    /// is set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the language for subsequent parses.
    pub fn set_language(&mut self, language: &Language) {
        self.language = Some(language.clone());
    }

    /// The current language.
    #[must_use]
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Sets the limits for subsequent parses.
    pub fn set_options(&mut self, options: ParseOptions) {
        self.options = options;
    }

    /// The current limits.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses `text`. With `old_tree` (already edited to match `text`),
    /// unchanged subtrees are reused.
    ///
    /// Returns `None` only when no language is set. Syntax errors never fail
    /// the parse; they become ERROR and MISSING nodes.
    pub fn parse(&mut self, text: impl AsRef<[u8]>, old_tree: Option<&Tree>) -> Option<Tree> {
        let language = self.language.clone()?;
        let text = text.as_ref();
        let old_tree = old_tree.filter(|tree| {
            let usable = tree.language().same_as(&language) && tree.len_bytes() == text.len();
            if !usable {
                tracing::debug!("previous tree does not match the input, parsing from scratch");
            }
            usable
        });

        let span = tracing::debug_span!(
            "parse",
            language = language.name(),
            bytes = text.len(),
            incremental = old_tree.is_some()
        );
        let _guard = span.enter();
        let run = ParseRun::new(&language, text, old_tree, &self.options);
        Some(run.run())
    }

    /// Parses text supplied in chunks. `read` receives a byte offset and its
    /// position and returns the text starting there; an empty chunk ends the
    /// input.
    pub fn parse_with<F, T>(&mut self, mut read: F, old_tree: Option<&Tree>) -> Option<Tree>
    where
        F: FnMut(usize, Point) -> T,
        T: AsRef<[u8]>,
    {
        let mut text = Vec::new();
        let mut point = Point::default();
        loop {
            let chunk = read(text.len(), point);
            let chunk = chunk.as_ref();
            if chunk.is_empty() {
                break;
            }
            point = point.advance(chunk);
            text.extend_from_slice(chunk);
        }
        self.parse(text, old_tree)
    }

    /// Applies `edits` to `tree` and reparses `text`, the document after the
    /// edits.
    ///
    /// # Errors
    ///
    /// Returns [`EditError`] if an edit is malformed; nothing is parsed.
    pub fn reparse(
        &mut self,
        tree: &Tree,
        edits: &[InputEdit],
        text: impl AsRef<[u8]>,
    ) -> Result<Option<Tree>, EditError> {
        let edited = tree.edit_all(edits)?;
        Ok(self.parse(text, Some(&edited)))
    }
}

struct Finished {
    root: Subtree,
    error_cost: u32,
    dynamic_precedence: i32,
}

#[derive(Default)]
struct Stats {
    operations: u64,
    lexed: usize,
    reused: usize,
    reused_bytes: usize,
    forks: usize,
}

struct ParseRun<'a> {
    language: &'a Language,
    lexer: Lexer<'a>,
    options: &'a ParseOptions,
    versions: Vec<Version>,
    finished: Vec<Finished>,
    stats: Stats,
}

impl<'a> ParseRun<'a> {
    fn new(language: &'a Language, text: &'a [u8], old_tree: Option<&Tree>, options: &'a ParseOptions) -> Self {
        Self {
            language,
            lexer: Lexer::new(language, text),
            options,
            versions: vec![Version::new(old_tree.map(ReuseCursor::new))],
            finished: Vec::new(),
            stats: Stats::default(),
        }
    }

    fn run(mut self) -> Tree {
        loop {
            if self.should_stop() {
                tracing::debug!(operations = self.stats.operations, "parse stopped early");
                return self.partial_tree();
            }
            let Some(index) = self.next_version() else {
                break;
            };
            self.stats.operations += 1;
            self.advance(index);
            self.condense();
        }
        tracing::debug!(
            operations = self.stats.operations,
            lexed = self.stats.lexed,
            reused = self.stats.reused,
            reused_bytes = self.stats.reused_bytes,
            forks = self.stats.forks,
            "parse finished"
        );
        self.best_tree()
    }

    fn should_stop(&self) -> bool {
        if self
            .options
            .max_operations
            .is_some_and(|max| self.stats.operations >= max)
        {
            return true;
        }
        if self
            .options
            .cancellation
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return true;
        }
        self.stats.operations % 64 == 0 && self.options.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The live version furthest behind; ties go to the earliest.
    fn next_version(&self) -> Option<usize> {
        self.versions
            .iter()
            .enumerate()
            .filter(|(_, version)| !version.halted)
            .min_by_key(|(index, version)| (version.position.bytes, *index))
            .map(|(index, _)| index)
    }

    fn advance(&mut self, index: usize) {
        let token = self.lookahead(index);
        let state = self.versions[index].state();
        let actions = self.actions_for(state, &token);

        if !self.versions[index].pending.is_empty() {
            if actions.is_empty() {
                if self.is_shiftable_extra(&token) {
                    let version = &mut self.versions[index];
                    version.position = version.position + token.size;
                    version.pending.push(token.with_extra(true));
                    version.lookahead = None;
                    version.after_extra = true;
                    version.reductions = 0;
                } else {
                    self.recover(index, &token);
                }
                return;
            }
            self.flush_pending(index);
        }

        let Some((&first, rest)) = actions.split_first() else {
            if !token.is_leaf() {
                // A reused node that no longer fits: lex from here instead.
                let version = &mut self.versions[index];
                version.lookahead = None;
                version.reuse = None;
            } else if self.is_shiftable_extra(&token) {
                tracing::trace!(state, symbol = token.symbol, "shift extra");
                self.shift(index, state, &token, true);
            } else {
                self.recover(index, &token);
            }
            return;
        };

        for &action in rest {
            let fork = self.versions[index].clone();
            self.versions.push(fork);
            let fork = self.versions.len() - 1;
            self.stats.forks += 1;
            self.apply(fork, action, &token);
        }
        self.apply(index, first, &token);
    }

    fn is_shiftable_extra(&self, token: &Subtree) -> bool {
        token.is_leaf() && token.symbol != END_SYMBOL && !token.missing && self.language.is_extra(token.symbol)
    }

    fn actions_for(&self, state: StateId, token: &Subtree) -> Vec<ParseAction> {
        if self.language.is_nonterminal(token.symbol) {
            return self
                .language
                .goto(state, token.symbol)
                .map(|next| vec![ParseAction::Shift(next)])
                .unwrap_or_default();
        }
        self.language.actions(state, token.symbol).to_vec()
    }

    fn apply(&mut self, index: usize, action: ParseAction, token: &Subtree) {
        match action {
            ParseAction::Shift(next) => {
                tracing::trace!(version = index, next, symbol = token.symbol, "shift");
                self.shift(index, next, token, false);
            }
            ParseAction::Reduce(production) => {
                tracing::trace!(version = index, production, "reduce");
                let version = &mut self.versions[index];
                version.reductions += 1;
                if version.reductions > MAX_REDUCTIONS_PER_POSITION {
                    tracing::debug!(version = index, "reduction limit reached without progress");
                    self.finish_with_error(index);
                } else if !self.reduce(index, production, token) {
                    self.recover(index, token);
                }
            }
            ParseAction::Accept => {
                tracing::trace!(version = index, "accept");
                self.accept(index);
            }
        }
    }

    /// The next token for a version: a reusable subtree from the old tree if
    /// one fits, otherwise a freshly lexed token.
    fn lookahead(&mut self, index: usize) -> Subtree {
        if let Some(token) = &self.versions[index].lookahead {
            return token.clone();
        }
        let token = match self.reusable_node(index) {
            Some(node) => {
                self.stats.reused += 1;
                self.stats.reused_bytes += node.size.bytes;
                node
            }
            None => {
                let version = &self.versions[index];
                let lex_state = if version.pending.is_empty() {
                    self.language.lex_state(version.state())
                } else {
                    ERROR_LEX_STATE
                };
                self.stats.lexed += 1;
                self.lexer.lex(&LexRequest {
                    position: version.position,
                    lex_state,
                    after_extra: version.after_extra,
                    external_state: &version.external_state,
                })
            }
        };
        self.versions[index].lookahead = Some(token.clone());
        token
    }

    fn reusable_node(&mut self, index: usize) -> Option<Subtree> {
        let language = self.language;
        let version = &mut self.versions[index];
        if !version.pending.is_empty() {
            return None;
        }
        let position = version.position.bytes;
        let state = version.state();
        let external_state = version.external_state.clone();
        let after_extra = version.after_extra;
        let cursor = version.reuse.as_mut()?;

        loop {
            let (node, start) = cursor.current()?;
            let end = start + node.size.bytes;
            if start > position {
                return None;
            }
            if start < position || node.size.bytes == 0 {
                if end <= position || node.size.bytes == 0 || !cursor.descend() {
                    cursor.advance();
                }
                continue;
            }

            let unchanged = !node.has_changes && !node.has_error() && !node.fragile && !node.missing;
            let context_matches = cursor.last_external() == &external_state;
            if node.is_leaf() {
                let fits = unchanged
                    && context_matches
                    && node.lex_state != ERROR_LEX_STATE
                    && node.lex_state == language.lex_state(state)
                    && node.after_extra == after_extra
                    && (language.has_actions(state, node.symbol) || language.is_extra(node.symbol));
                if !fits {
                    return None;
                }
            } else {
                let fits = unchanged
                    && context_matches
                    && node.parse_state == state
                    && language.goto(state, node.symbol).is_some();
                if !fits {
                    cursor.descend();
                    continue;
                }
            }

            let node = node.clone();
            cursor.advance();
            tracing::trace!(position, symbol = node.symbol, bytes = node.size.bytes, "reused subtree");
            return Some(node);
        }
    }

    fn shift(&mut self, index: usize, next: StateId, token: &Subtree, extra: bool) {
        let version = &mut self.versions[index];
        let state = version.state();
        let subtree = token.with_parse_state(state).with_extra(extra);
        let extra_leaf = extra && subtree.is_leaf();
        version.push(if extra { state } else { next }, subtree);
        version.position = version.position + token.size;
        version.lookahead = None;
        version.after_extra = extra_leaf;
        version.reductions = 0;
    }

    /// Returns false if the goto is missing, which only happens when error
    /// recovery left the stack in an unexpected shape.
    fn reduce(&mut self, index: usize, production: ProductionId, lookahead: &Subtree) -> bool {
        let language = self.language;
        let Some(info) = language.production(production) else {
            return false;
        };
        let fragile = self.versions.len() > 1;
        let version = &mut self.versions[index];

        let mut trailing = Vec::new();
        while version
            .stack
            .last()
            .and_then(|entry| entry.subtree.as_ref())
            .is_some_and(|subtree| subtree.extra)
        {
            trailing.extend(version.pop(1));
        }
        trailing.reverse();

        let mut popped = Vec::new();
        let mut remaining = info.child_count();
        while remaining > 0 {
            let Some(subtree) = version.pop(1).pop() else {
                return false;
            };
            if !subtree.extra {
                remaining -= 1;
            }
            popped.push(subtree);
        }
        popped.reverse();

        let mut step = 0;
        let mut children = Vec::with_capacity(popped.len());
        for subtree in popped {
            if subtree.extra {
                children.push((None, subtree));
                continue;
            }
            let field = info.fields.get(step).copied().flatten();
            let subtree = match info.aliases.get(step).copied().flatten() {
                Some(alias) => subtree.with_alias(language, alias),
                None => subtree,
            };
            children.push((field, subtree));
            step += 1;
        }

        let state = version.state();
        let Some(next) = language.goto(state, info.lhs) else {
            return false;
        };
        let node_end = version.stack.last().map_or(0, |entry| entry.end.bytes)
            + children.iter().map(|(_, child)| child.size.bytes).sum::<usize>();
        let lookahead_end = version.position.bytes + lookahead.size.bytes + lookahead.lookahead_bytes;
        let node = Subtree::node(
            language,
            &NodeSpec {
                symbol: info.lhs,
                parse_state: state,
                dynamic_precedence: info.dynamic_precedence,
                error_cost: 0,
                fragile,
                trailing_lookahead: lookahead_end.saturating_sub(node_end),
            },
            children,
        );
        version.dynamic_precedence += info.dynamic_precedence;
        version.push(next, node);
        for extra in trailing {
            version.push(next, extra);
        }
        true
    }

    fn accept(&mut self, index: usize) {
        let version = &mut self.versions[index];
        version.halted = true;
        let subtrees = version.subtrees();
        let (error_cost, dynamic_precedence) = (version.error_cost, version.dynamic_precedence);
        let root = build_root(self.language, subtrees, error_cost);
        self.finished.push(Finished {
            root,
            error_cost,
            dynamic_precedence,
        });
    }

    /// Forks a version into every applicable recovery strategy.
    fn recover(&mut self, index: usize, token: &Subtree) {
        let language = self.language;
        let version = &self.versions[index];
        let position = version.position.bytes;
        let at_end = token.symbol == END_SYMBOL;
        let mut options = Vec::new();

        if !at_end && version.pending.is_empty() && version.missing_at != Some(position) {
            if let Some(option) = self.insert_missing(version, token) {
                options.push(option);
            }
        }
        if version.recovered_at != Some(position) {
            if let Some(option) = self.pop_until_valid(version, token) {
                options.push(option);
            }
        }
        if !at_end {
            let mut option = version.clone();
            let mut cost = skipped_cost(token);
            if option.pending.is_empty() {
                cost += ERROR_COST_PER_RECOVERY;
            }
            option.pending.push(token.clone());
            option.pending_cost += cost;
            option.error_cost += cost;
            option.position = option.position + token.size;
            option.lookahead = None;
            option.after_extra = false;
            option.reductions = 0;
            if let Some(external) = &token.last_external {
                option.external_state = external.clone();
            }
            options.push(option);
        }

        tracing::debug!(
            version = index,
            position,
            symbol = language.symbol_name(token.symbol).unwrap_or("?"),
            options = options.len(),
            "recovering from syntax error"
        );

        let mut options = options.into_iter();
        match options.next() {
            Some(first) => {
                self.versions[index] = first;
                self.versions.extend(options);
            }
            None => self.finish_with_error(index),
        }
    }

    /// Assumes the first terminal after which `token` would be accepted.
    fn insert_missing(&self, version: &Version, token: &Subtree) -> Option<Version> {
        let language = self.language;
        let state = version.state();
        let symbol = language
            .valid_terminals(language.lex_state(state))
            .iter()
            .copied()
            .filter(|&symbol| symbol != END_SYMBOL && !language.is_extra(symbol))
            .find(|&symbol| {
                language.actions(state, symbol).iter().any(|action| {
                    matches!(action, ParseAction::Shift(next) if language.has_actions(*next, token.symbol))
                })
            })?;
        let next = language.actions(state, symbol).iter().find_map(|action| match action {
            ParseAction::Shift(next) => Some(*next),
            _ => None,
        })?;

        let mut option = version.clone();
        option.push(next, Subtree::missing(language, symbol, state, ERROR_COST_PER_MISSING_TREE));
        option.error_cost += ERROR_COST_PER_MISSING_TREE;
        option.missing_at = Some(version.position.bytes);
        option.after_extra = false;
        Some(option)
    }

    /// Pops the fewest entries that leave a state accepting `token`, wrapping
    /// them (and anything skipped) in an ERROR node.
    fn pop_until_valid(&self, version: &Version, token: &Subtree) -> Option<Version> {
        let language = self.language;
        let depth = (1..version.stack.len()).find(|&depth| {
            let state = version.stack[version.stack.len() - 1 - depth].state;
            language.has_actions(state, token.symbol)
        })?;

        let mut option = version.clone();
        let mut children = option.pop(depth);
        let popped_cost: u32 = children
            .iter()
            .filter(|child| !child.extra || child.is_error())
            .map(skipped_cost)
            .sum();
        children.append(&mut option.pending);
        let state = option.state();
        let cost = ERROR_COST_PER_RECOVERY + popped_cost;
        let error = Subtree::error(language, state, cost + option.pending_cost, children);
        option.push(state, error.with_extra(true));
        option.error_cost += cost;
        option.pending_cost = 0;
        option.recovered_at = Some(option.position.bytes);
        option.after_extra = false;
        Some(option)
    }

    /// Wraps skipped tokens in an ERROR node now that the lookahead fits.
    fn flush_pending(&mut self, index: usize) {
        let language = self.language;
        let version = &mut self.versions[index];
        let mut pending = std::mem::take(&mut version.pending);
        let cost = std::mem::take(&mut version.pending_cost);

        let keep = pending
            .iter()
            .rposition(|subtree| !subtree.extra)
            .map_or(0, |last| last + 1);
        let trailing = pending.split_off(keep);
        let state = version.state();
        if !pending.is_empty() {
            version.push(state, Subtree::error(language, state, cost, pending).with_extra(true));
        }
        for extra in trailing {
            version.push(state, extra);
        }
        version.recovered_at = Some(version.position.bytes);
    }

    fn finish_with_error(&mut self, index: usize) {
        let language = self.language;
        let version = &mut self.versions[index];
        version.halted = true;
        let mut children = version.subtrees();
        children.append(&mut version.pending);
        let cost = version.error_cost + ERROR_COST_PER_RECOVERY;
        tracing::debug!(version = index, cost, "no recovery left, wrapping input in an ERROR root");
        let root = Subtree::error(language, 0, ERROR_COST_PER_RECOVERY, children);
        self.finished.push(Finished {
            root,
            error_cost: cost,
            dynamic_precedence: version.dynamic_precedence,
        });
    }

    /// Drops halted and hopeless versions, merges equivalent ones and caps
    /// the number alive.
    fn condense(&mut self) {
        self.versions.retain(|version| !version.halted);

        let best_active = self.versions.iter().map(|version| version.error_cost).min();
        let best_finished = self.finished.iter().map(|finished| finished.error_cost).min();
        if let Some(best) = best_active {
            self.versions.retain(|version| {
                version.error_cost <= best.saturating_add(MAX_COST_DIFFERENCE)
                    && best_finished.is_none_or(|finished| version.error_cost <= finished)
            });
        }

        let mut index = 0;
        while index < self.versions.len() {
            let mut other = index + 1;
            while other < self.versions.len() {
                if self.versions[index].can_merge(&self.versions[other]) {
                    if self.versions[other].is_better_than(&self.versions[index]) {
                        self.versions.swap(index, other);
                    }
                    self.versions.remove(other);
                } else {
                    other += 1;
                }
            }
            index += 1;
        }

        if self.versions.len() > MAX_VERSIONS {
            let mut ranked: Vec<usize> = (0..self.versions.len()).collect();
            ranked.sort_by_key(|&index| {
                let version = &self.versions[index];
                (version.error_cost, -version.dynamic_precedence, index)
            });
            let mut keep = vec![false; self.versions.len()];
            for &index in ranked.iter().take(MAX_VERSIONS) {
                keep[index] = true;
            }
            let mut keep = keep.into_iter();
            self.versions.retain(|_| keep.next().unwrap_or(false));
        }
    }

    fn best_tree(mut self) -> Tree {
        let best = self
            .finished
            .iter()
            .enumerate()
            .min_by_key(|(index, finished)| (finished.error_cost, -finished.dynamic_precedence, *index))
            .map(|(index, _)| index);
        match best {
            Some(index) => {
                let finished = self.finished.swap_remove(index);
                Tree::new(finished.root, self.language.clone(), true)
            }
            None => self.partial_tree(),
        }
    }

    /// Everything the most promising version has consumed, under an ERROR
    /// root.
    fn partial_tree(self) -> Tree {
        let best = self
            .versions
            .iter()
            .filter(|version| !version.halted)
            .min_by_key(|version| (version.error_cost, -version.dynamic_precedence));
        let children = best.map_or_else(Vec::new, |version| {
            let mut children = version.subtrees();
            children.extend(version.pending.iter().cloned());
            children
        });
        Tree::new(Subtree::error(self.language, 0, 0, children), self.language.clone(), false)
    }
}

fn skipped_cost(subtree: &Subtree) -> u32 {
    let bytes = u32::try_from(subtree.size.bytes).unwrap_or(u32::MAX);
    let lines = u32::try_from(subtree.size.extent.row).unwrap_or(u32::MAX);
    ERROR_COST_PER_SKIPPED_TREE
        .saturating_add(bytes.saturating_mul(ERROR_COST_PER_SKIPPED_CHAR))
        .saturating_add(lines.saturating_mul(ERROR_COST_PER_SKIPPED_LINE))
}

/// The root of a finished parse: the start node's children with leading and
/// trailing extras around them, or an ERROR root if no start node is alone on
/// the stack.
fn build_root(language: &Language, subtrees: Vec<Subtree>, error_cost: u32) -> Subtree {
    let start = language.start_symbol();
    let start_node = {
        let mut main = subtrees.iter().filter(|subtree| !subtree.extra);
        match (main.next(), main.next()) {
            (Some(node), None) if node.symbol == start => Some(node.clone()),
            _ => None,
        }
    };
    let Some(start_node) = start_node else {
        return Subtree::error(language, 0, error_cost, subtrees);
    };

    let own_precedence = start_node.dynamic_precedence
        - start_node
            .children
            .iter()
            .map(|child| child.subtree.dynamic_precedence)
            .sum::<i32>();
    let mut children = Vec::new();
    for subtree in subtrees {
        if subtree.ptr_eq(&start_node) {
            children.extend(
                start_node
                    .children
                    .iter()
                    .map(|child| (child.field, child.subtree.clone())),
            );
        } else {
            children.push((None, subtree));
        }
    }
    Subtree::node(
        language,
        &NodeSpec {
            symbol: start,
            parse_state: 0,
            dynamic_precedence: own_precedence,
            error_cost: 0,
            fragile: start_node.fragile,
            trailing_lookahead: 0,
        },
        children,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{
        choice, field, optional, pattern, prec_dynamic, prec_left, repeat, seq, string, sym,
    };
    use crate::grammar::Grammar;
    use pretty_assertions::assert_eq;

    fn arithmetic() -> Language {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(
                        1,
                        seq(vec![
                            field("left", sym("expr")),
                            string("+"),
                            field("right", sym("expr")),
                        ]),
                    ),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        Language::generate(&grammar).unwrap()
    }

    fn parser() -> Parser {
        let mut parser = Parser::new();
        parser.set_language(&arithmetic());
        parser
    }

    #[test]
    fn test_parse_without_language_returns_none() {
        assert!(Parser::new().parse("1", None).is_none());
    }

    #[test]
    fn test_left_associative_sum() {
        let tree = parser().parse("1+2+3", None).unwrap();
        assert!(tree.is_complete());
        assert!(!tree.has_error());
        assert_eq!(
            tree.root_node().to_sexp(),
            "(expr left: (expr left: (expr (number)) right: (expr (number))) right: (expr (number)))"
        );
    }

    #[test]
    fn test_trailing_operator_becomes_error() {
        let tree = parser().parse("1+", None).unwrap();
        assert!(tree.has_error());
        let errors = tree.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].range.bytes(), 1..2);
        let number = tree.root_node().named_descendant_for_byte_range(0, 1).unwrap();
        assert_eq!(number.kind(), "number");
        assert!(!number.has_error());
    }

    #[test]
    fn test_garbage_in_the_middle_is_contained() {
        let text = "1 + % + 2";
        let tree = parser().parse(text, None).unwrap();
        assert!(tree.has_error());
        assert_eq!(tree.unparse(text.as_bytes()), text.as_bytes());
        assert!(tree.errors().iter().all(|error| error.range.start_byte >= 2));
    }

    #[test]
    fn test_empty_input_for_non_nullable_grammar() {
        let tree = parser().parse("", None).unwrap();
        assert!(tree.has_error());
        assert_eq!(tree.len_bytes(), 0);
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let mut parser = parser();
        let a = parser.parse("1 + + 2 3", None).unwrap();
        let b = parser.parse("1 + + 2 3", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_incremental_parse_matches_fresh_parse() {
        let mut parser = parser();
        let old_text = "1 + 2 + 3 + 4";
        let tree = parser.parse(old_text, None).unwrap();

        let edit = InputEdit::replace(old_text.as_bytes(), 4..5, b"20");
        let new_text = "1 + 20 + 3 + 4";
        let incremental = parser.reparse(&tree, &[edit], new_text).unwrap().unwrap();
        let fresh = parser.parse(new_text, None).unwrap();
        assert_eq!(incremental, fresh);
        assert_eq!(incremental.to_string(), fresh.to_string());
    }

    #[test]
    fn test_incremental_parse_repairs_errors() {
        let mut parser = parser();
        let tree = parser.parse("1 + ", None).unwrap();
        assert!(tree.has_error());
        let edit = InputEdit::replace(b"1 + ", 4..4, b"2");
        let repaired = parser.reparse(&tree, &[edit], "1 + 2").unwrap().unwrap();
        assert!(!repaired.has_error());
        assert_eq!(repaired, parser.parse("1 + 2", None).unwrap());
    }

    #[test]
    fn test_unchanged_reparse_reuses_root() {
        let mut parser = parser();
        let tree = parser.parse("1+2", None).unwrap();
        let again = parser.parse("1+2", Some(&tree)).unwrap();
        assert_eq!(again, tree);
    }

    #[test]
    fn test_malformed_edit_is_rejected_before_parsing() {
        let mut parser = parser();
        let tree = parser.parse("1+2", None).unwrap();
        let mut edit = InputEdit::replace(b"1+2", 0..1, b"9");
        edit.start_byte = 50;
        assert!(parser.reparse(&tree, &[edit], "9+2").is_err());
    }

    #[test]
    fn test_parse_with_chunks() {
        let chunks = ["1 +", " 2", ""];
        let mut next = chunks.iter();
        let tree = parser()
            .parse_with(|_, _| next.next().copied().unwrap_or(""), None)
            .unwrap();
        assert_eq!(tree.len_bytes(), 5);
        assert!(!tree.has_error());
    }

    #[test]
    fn test_operation_limit_yields_partial_tree() {
        let mut parser = parser();
        parser.set_options(ParseOptions::default().with_max_operations(3));
        let tree = parser.parse("1+2+3+4+5", None).unwrap();
        assert!(!tree.is_complete());
    }

    #[test]
    fn test_cancellation_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut parser = parser();
        parser.set_options(ParseOptions::default().with_cancellation(flag.clone()));
        assert!(!parser.parse("1+2", None).unwrap().is_complete());
        flag.store(false, Ordering::Relaxed);
        assert!(parser.parse("1+2", None).unwrap().is_complete());
    }

    #[test]
    fn test_ambiguity_resolved_by_dynamic_precedence() {
        let grammar = Grammar::new("ambiguous")
            .rule("program", repeat(sym("_item")))
            .rule("_item", choice(vec![sym("call"), sym("pair")]))
            .rule(
                "call",
                prec_dynamic(1, seq(vec![sym("name"), string("("), string(")")])),
            )
            .rule("pair", seq(vec![sym("name"), string("("), string(")")]))
            .rule("name", pattern("[a-z]+"))
            .conflict(&["call", "pair"]);
        let mut parser = Parser::new();
        parser.set_language(&Language::generate(&grammar).unwrap());
        let tree = parser.parse("f() g()", None).unwrap();
        assert!(!tree.has_error());
        assert_eq!(tree.root_node().to_sexp(), "(program (call (name)) (call (name)))");
    }

    #[test]
    fn test_shared_separator_lexes_by_context() {
        let grammar = Grammar::new("lists")
            .rule("program", repeat(choice(vec![sym("name_list"), sym("code_list")])))
            .rule(
                "name_list",
                seq(vec![string("N"), sym("name"), repeat(seq(vec![sym("_sep"), sym("name")]))]),
            )
            .rule(
                "code_list",
                seq(vec![string("C"), sym("code"), repeat(seq(vec![sym("_sep"), sym("code")]))]),
            )
            .rule("_sep", seq(vec![string(","), optional(string("+"))]))
            .rule("name", pattern("[a-z]+"))
            .rule("code", pattern("[a-z0-9]+"));
        let mut parser = Parser::new();
        parser.set_language(&Language::generate(&grammar).unwrap());
        let tree = parser.parse("C ab,cd,+ef N gh,+ij", None).unwrap();
        assert!(!tree.has_error(), "{tree}");
        assert_eq!(
            tree.root_node().to_sexp(),
            "(program (code_list (code) (code) (code)) (name_list (name) (name)))"
        );
    }
}
