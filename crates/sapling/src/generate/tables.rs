//! LR(1) table construction with yacc-style conflict resolution.
//!
//! States with equal cores are merged as in LALR(1), except when the merge
//! would make a token valid next to another token that can match the same
//! text. The lexer only considers the tokens valid in the current state, so
//! such a merge would let one context steal tokens from another.
//!
//! Conflicts that precedence and associativity cannot settle are kept as
//! multiple actions in one cell; the parser explores them in parallel.

use super::prepare::{Associativity, PreparedGrammar};
use super::GenerateError;
use crate::language::{ParseAction, ProductionId, StateId, Symbol, SymbolKind, TokenMatcher, END_SYMBOL};
use fixedbitset::FixedBitSet;
use regex::bytes::Regex;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A production index (0 is the augmented start production) and dot position.
type Item = (usize, usize);

type Kernel = Vec<(Item, FixedBitSet)>;

pub(super) struct Tables {
    pub state_count: u32,
    pub parse_table: Vec<u32>,
    pub action_lists: Vec<Vec<ParseAction>>,
    pub lex_states: Vec<Vec<Symbol>>,
    pub state_lex_states: Vec<u16>,
}

struct Builder<'p> {
    grammar: &'p PreparedGrammar,
    /// `rhs[0]` is the augmented production `S' -> start`.
    rhs: Vec<Vec<Symbol>>,
    by_lhs: Vec<Vec<usize>>,
    nullable: Vec<bool>,
    first: Vec<FixedBitSet>,
    terminal_count: usize,
    /// Terminals each terminal can compete with for the same text.
    conflicts: Vec<FixedBitSet>,
}

pub(super) fn build(grammar: &PreparedGrammar) -> Result<Tables, GenerateError> {
    let mut builder = Builder::new(grammar);
    builder.compute_first_sets();
    let (kernels, transitions) = builder.item_sets()?;
    builder.tables(&kernels, &transitions)
}

impl<'p> Builder<'p> {
    fn new(grammar: &'p PreparedGrammar) -> Self {
        let symbol_count = grammar.symbols.len();
        let terminal_count = (0..symbol_count)
            .filter_map(|index| Symbol::try_from(index).ok())
            .filter(|&symbol| grammar.is_terminal(symbol))
            .map(|symbol| usize::from(symbol) + 1)
            .max()
            .unwrap_or(1);

        let mut rhs = vec![vec![grammar.start]];
        let mut by_lhs = vec![Vec::new(); symbol_count];
        for production in &grammar.productions {
            by_lhs[usize::from(production.lhs)].push(rhs.len());
            rhs.push(production.steps.iter().map(|step| step.symbol).collect());
        }

        Self {
            grammar,
            rhs,
            by_lhs,
            nullable: vec![false; symbol_count],
            first: vec![FixedBitSet::with_capacity(terminal_count); symbol_count],
            terminal_count,
            conflicts: token_conflicts(grammar, terminal_count),
        }
    }

    fn is_terminal(&self, symbol: Symbol) -> bool {
        usize::from(symbol) < self.terminal_count && self.grammar.is_terminal(symbol)
    }

    fn compute_first_sets(&mut self) {
        for index in 0..self.terminal_count {
            if let Ok(symbol) = Symbol::try_from(index) {
                if self.is_terminal(symbol) {
                    self.first[index].insert(index);
                }
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for production in &self.grammar.productions {
                let lhs = usize::from(production.lhs);
                let mut all_nullable = true;
                for step in &production.steps {
                    let symbol = usize::from(step.symbol);
                    if symbol != lhs {
                        let addition = self.first[symbol].clone();
                        let before = self.first[lhs].count_ones(..);
                        self.first[lhs].union_with(&addition);
                        changed |= self.first[lhs].count_ones(..) != before;
                    }
                    if !self.nullable[symbol] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !self.nullable[lhs] {
                    self.nullable[lhs] = true;
                    changed = true;
                }
            }
        }
    }

    /// FIRST of `symbols`, plus `follow` when all of them can be empty.
    fn first_of(&self, symbols: &[Symbol], follow: &FixedBitSet) -> FixedBitSet {
        let mut result = FixedBitSet::with_capacity(self.terminal_count);
        for &symbol in symbols {
            result.union_with(&self.first[usize::from(symbol)]);
            if !self.nullable[usize::from(symbol)] {
                return result;
            }
        }
        result.union_with(follow);
        result
    }

    fn closure(&self, kernel: &[(Item, FixedBitSet)]) -> Kernel {
        let mut items: Kernel = kernel.to_vec();
        let mut index: FxHashMap<Item, usize> = items
            .iter()
            .enumerate()
            .map(|(position, (item, _))| (*item, position))
            .collect();
        let mut queue: VecDeque<usize> = (0..items.len()).collect();

        while let Some(position) = queue.pop_front() {
            let ((production, dot), lookahead) = items[position].clone();
            let rhs = &self.rhs[production];
            let Some(&next) = rhs.get(dot) else {
                continue;
            };
            if self.is_terminal(next) {
                continue;
            }
            let follow = self.first_of(&rhs[dot + 1..], &lookahead);
            for &candidate in &self.by_lhs[usize::from(next)] {
                let item = (candidate, 0);
                match index.get(&item) {
                    Some(&existing) => {
                        if !follow.is_subset(&items[existing].1) {
                            items[existing].1.union_with(&follow);
                            queue.push_back(existing);
                        }
                    }
                    None => {
                        index.insert(item, items.len());
                        queue.push_back(items.len());
                        items.push((item, follow.clone()));
                    }
                }
            }
        }
        items
    }

    /// Terminals the lexer considers in a state with this kernel.
    fn valid_terminals(&self, kernel: &[(Item, FixedBitSet)]) -> FixedBitSet {
        let mut valid = FixedBitSet::with_capacity(self.terminal_count);
        for ((production, dot), lookahead) in self.closure(kernel) {
            match self.rhs[production].get(dot) {
                Some(&symbol) if self.is_terminal(symbol) => valid.insert(usize::from(symbol)),
                Some(_) => {}
                None => valid.union_with(&lookahead),
            }
        }
        valid
    }

    /// Two states can share a lex state when no token valid in only one of
    /// them competes with a token valid in the other.
    fn compatible(&self, left: &FixedBitSet, right: &FixedBitSet) -> bool {
        let clashes = |one: &FixedBitSet, other: &FixedBitSet| {
            one.difference(other)
                .any(|token| !self.conflicts[token].is_disjoint(other))
        };
        !clashes(left, right) && !clashes(right, left)
    }

    /// Builds LR(1) item sets, merging states with equal cores whenever
    /// their valid tokens are compatible.
    #[allow(clippy::type_complexity)]
    fn item_sets(&self) -> Result<(Vec<Kernel>, Vec<BTreeMap<Symbol, usize>>), GenerateError> {
        let mut end = FixedBitSet::with_capacity(self.terminal_count);
        end.insert(usize::from(END_SYMBOL));

        let initial = vec![((0, 0), end)];
        let mut valid = vec![self.valid_terminals(&initial)];
        let mut kernels: Vec<Kernel> = vec![initial];
        let mut transitions: Vec<BTreeMap<Symbol, usize>> = vec![BTreeMap::new()];
        let mut by_core: FxHashMap<Vec<Item>, Vec<usize>> = FxHashMap::default();
        by_core.insert(vec![(0, 0)], vec![0]);
        let mut queue = VecDeque::from([0]);
        let mut queued = vec![true];
        let mut splits = 0_usize;

        while let Some(state) = queue.pop_front() {
            queued[state] = false;
            let closure = self.closure(&kernels[state]);

            let mut successors: BTreeMap<Symbol, Kernel> = BTreeMap::new();
            for ((production, dot), lookahead) in closure {
                if let Some(&symbol) = self.rhs[production].get(dot) {
                    successors
                        .entry(symbol)
                        .or_default()
                        .push(((production, dot + 1), lookahead));
                }
            }

            for (symbol, mut kernel) in successors {
                kernel.sort_by_key(|(item, _)| *item);
                kernel.dedup_by(|(item, lookahead), (kept, kept_lookahead)| {
                    if item == kept {
                        kept_lookahead.union_with(lookahead);
                        true
                    } else {
                        false
                    }
                });
                let core: Vec<Item> = kernel.iter().map(|(item, _)| *item).collect();
                let kernel_valid = self.valid_terminals(&kernel);
                let same_core = by_core.get(&core).map_or(&[][..], Vec::as_slice);
                let existing = same_core
                    .iter()
                    .copied()
                    .find(|&candidate| self.compatible(&valid[candidate], &kernel_valid));
                if existing.is_none() && !same_core.is_empty() {
                    splits += 1;
                }

                let target = if let Some(existing) = existing {
                    let mut changed = false;
                    for ((_, lookahead), (_, merged)) in kernel.iter().zip(&mut kernels[existing]) {
                        if !lookahead.is_subset(merged) {
                            merged.union_with(lookahead);
                            changed = true;
                        }
                    }
                    valid[existing].union_with(&kernel_valid);
                    if changed && !queued[existing] {
                        queued[existing] = true;
                        queue.push_back(existing);
                    }
                    existing
                } else {
                    let created = kernels.len();
                    if u32::try_from(created).is_err() {
                        return Err(GenerateError::TooManyStates);
                    }
                    kernels.push(kernel);
                    valid.push(kernel_valid);
                    transitions.push(BTreeMap::new());
                    queued.push(true);
                    by_core.entry(core).or_default().push(created);
                    queue.push_back(created);
                    created
                };
                transitions[state].insert(symbol, target);
            }
        }

        tracing::debug!(states = kernels.len(), splits, "built LR(1) item sets");
        Ok((kernels, transitions))
    }

    #[allow(clippy::too_many_lines)]
    fn tables(
        &self,
        kernels: &[Kernel],
        transitions: &[BTreeMap<Symbol, usize>],
    ) -> Result<Tables, GenerateError> {
        let symbol_count = self.grammar.symbols.len();
        let state_count = kernels.len();
        let mut parse_table = vec![0_u32; state_count * symbol_count];
        let mut action_lists: Vec<Vec<ParseAction>> = vec![Vec::new()];
        let mut list_ids: FxHashMap<Vec<ParseAction>, u32> = FxHashMap::default();
        list_ids.insert(Vec::new(), 0);
        let mut lex_states: Vec<Vec<Symbol>> = Vec::new();
        let mut lex_ids: FxHashMap<Vec<Symbol>, u16> = FxHashMap::default();
        let mut state_lex_states = Vec::with_capacity(state_count);

        for (state, kernel) in kernels.iter().enumerate() {
            let closure = self.closure(kernel);
            let mut shifts: BTreeMap<Symbol, (i32, BTreeSet<Symbol>)> = BTreeMap::new();
            let mut reduces: BTreeMap<Symbol, Vec<usize>> = BTreeMap::new();
            let mut accepts = false;

            for ((production, dot), lookahead) in &closure {
                let rhs = &self.rhs[*production];
                if let Some(&symbol) = rhs.get(*dot) {
                    if self.is_terminal(symbol) {
                        let step = &self.grammar.productions[production - 1].steps[*dot];
                        let entry = shifts.entry(symbol).or_insert((i32::MIN, BTreeSet::new()));
                        entry.0 = entry.0.max(step.precedence.unwrap_or(0));
                        entry.1.insert(self.grammar.productions[production - 1].lhs);
                    }
                } else if *production == 0 {
                    accepts = true;
                } else {
                    for terminal in lookahead.ones() {
                        if let Ok(terminal) = Symbol::try_from(terminal) {
                            reduces.entry(terminal).or_default().push(*production);
                        }
                    }
                }
            }

            let mut terminals: BTreeSet<Symbol> = shifts.keys().copied().collect();
            terminals.extend(reduces.keys().copied());
            if accepts {
                terminals.insert(END_SYMBOL);
            }

            let mut valid = Vec::new();
            for terminal in terminals {
                let mut actions = Vec::new();
                if accepts && terminal == END_SYMBOL {
                    actions.push(ParseAction::Accept);
                }
                let shift = shifts.get(&terminal).and_then(|(precedence, lhs)| {
                    transitions[state]
                        .get(&terminal)
                        .map(|&target| (target, *precedence, lhs))
                });
                let candidates = reduces.get(&terminal).map_or(&[][..], Vec::as_slice);
                let (keep_shift, kept) = self.resolve(state, terminal, shift, candidates);
                if let Some((target, _, _)) = shift.filter(|_| keep_shift) {
                    actions.push(ParseAction::Shift(state_id(target)?));
                }
                for production in kept {
                    actions.push(ParseAction::Reduce(production_id(production - 1)?));
                }
                if actions.is_empty() {
                    continue;
                }
                valid.push(terminal);
                let next_id = u32::try_from(action_lists.len()).map_err(|_| GenerateError::TooManyStates)?;
                let id = *list_ids.entry(actions.clone()).or_insert_with(|| {
                    action_lists.push(actions);
                    next_id
                });
                parse_table[state * symbol_count + usize::from(terminal)] = id;
            }

            for (&symbol, &target) in &transitions[state] {
                if !self.is_terminal(symbol) {
                    parse_table[state * symbol_count + usize::from(symbol)] = state_id(target)? + 1;
                }
            }

            let next_lex = u16::try_from(lex_states.len()).map_err(|_| GenerateError::TooManyStates)?;
            let lex_state = *lex_ids.entry(valid.clone()).or_insert_with(|| {
                lex_states.push(valid);
                next_lex
            });
            state_lex_states.push(lex_state);
        }

        tracing::debug!(
            states = state_count,
            action_lists = action_lists.len(),
            lex_states = lex_states.len(),
            "built parse table"
        );

        Ok(Tables {
            state_count: state_id(state_count)?,
            parse_table,
            action_lists,
            lex_states,
            state_lex_states,
        })
    }

    /// Resolves one table cell. Returns whether the shift survives and which
    /// reductions do.
    fn resolve(
        &self,
        state: usize,
        terminal: Symbol,
        shift: Option<(usize, i32, &BTreeSet<Symbol>)>,
        reduces: &[usize],
    ) -> (bool, Vec<usize>) {
        let productions = &self.grammar.productions;
        let mut kept: Vec<usize> = reduces.to_vec();

        if kept.len() > 1 {
            let best = kept
                .iter()
                .map(|&p| productions[p - 1].precedence)
                .max()
                .unwrap_or(0);
            kept.retain(|&p| productions[p - 1].precedence == best);
        }

        let mut keep_shift = shift.is_some();
        if let Some((_, shift_precedence, _)) = shift {
            kept.retain(|&p| {
                let production = &productions[p - 1];
                match production.precedence.cmp(&shift_precedence) {
                    std::cmp::Ordering::Greater => {
                        keep_shift = false;
                        true
                    }
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => match production.associativity {
                        Some(Associativity::Left) => {
                            keep_shift = false;
                            true
                        }
                        Some(Associativity::Right) => false,
                        None => true,
                    },
                }
            });
        }

        let action_count = kept.len() + usize::from(keep_shift);
        if action_count > 1 {
            let mut involved: BTreeSet<Symbol> = kept
                .iter()
                .map(|&p| self.owner(productions[p - 1].lhs))
                .collect();
            if keep_shift {
                if let Some((_, _, lhs)) = shift {
                    involved.extend(lhs.iter().map(|&symbol| self.owner(symbol)));
                }
            }
            let names: Vec<&str> = involved.iter().map(|&s| self.grammar.name(s)).collect();
            let expected = self.grammar.expected_conflicts.iter().any(|group| {
                involved.iter().all(|symbol| group.contains(symbol))
            });
            if expected {
                tracing::debug!(state, token = self.grammar.name(terminal), ?names, "expected conflict");
            } else {
                tracing::warn!(
                    state,
                    token = self.grammar.name(terminal),
                    ?names,
                    "unresolved conflict; keeping all actions"
                );
            }
        }

        (keep_shift, kept)
    }

    fn owner(&self, symbol: Symbol) -> Symbol {
        self.grammar
            .owners
            .get(usize::from(symbol))
            .copied()
            .unwrap_or(symbol)
    }
}

/// Which terminals can compete for the same text. Literals compare exactly;
/// a pattern competes with a literal when it matches a prefix of the literal
/// or of the literal plus one more printable byte. Two patterns, and any
/// external token, are assumed to compete.
fn token_conflicts(grammar: &PreparedGrammar, terminal_count: usize) -> Vec<FixedBitSet> {
    enum Lexical {
        Literal(Vec<u8>),
        Pattern(Option<Regex>),
        External,
        Unmatched,
    }

    let mut tokens: Vec<Vec<Lexical>> = (0..terminal_count).map(|_| Vec::new()).collect();
    for rule in &grammar.lex_rules {
        let Some(slot) = tokens.get_mut(usize::from(rule.symbol)) else {
            continue;
        };
        slot.push(match &rule.matcher {
            TokenMatcher::Literal(text) => Lexical::Literal(text.as_bytes().to_vec()),
            TokenMatcher::Pattern(source) => {
                Lexical::Pattern(Regex::new(&format!(r"\A(?:{source})")).ok())
            }
        });
    }
    for (index, slot) in tokens.iter_mut().enumerate() {
        let kind = grammar.symbols.get(index).map(|info| info.kind);
        if kind == Some(SymbolKind::External) {
            slot.push(Lexical::External);
        } else if slot.is_empty() {
            slot.push(Lexical::Unmatched);
        }
    }

    let pattern_meets_literal = |regex: Option<&Regex>, literal: &[u8]| {
        let Some(regex) = regex else {
            return true;
        };
        let mut probe = literal.to_vec();
        probe.push(0);
        (b' '..=b'~').chain([b'\n']).any(|byte| {
            if let Some(last) = probe.last_mut() {
                *last = byte;
            }
            regex.find(&probe).is_some_and(|found| found.end() > 0)
        })
    };
    let compete = |a: &Lexical, b: &Lexical| match (a, b) {
        (Lexical::Unmatched, _) | (_, Lexical::Unmatched) => false,
        (Lexical::External, _) | (_, Lexical::External) => true,
        (Lexical::Literal(x), Lexical::Literal(y)) => x.starts_with(y) || y.starts_with(x),
        (Lexical::Pattern(regex), Lexical::Literal(literal))
        | (Lexical::Literal(literal), Lexical::Pattern(regex)) => {
            pattern_meets_literal(regex.as_ref(), literal.as_slice())
        }
        (Lexical::Pattern(_), Lexical::Pattern(_)) => true,
    };

    let mut conflicts = vec![FixedBitSet::with_capacity(terminal_count); terminal_count];
    for a in 0..terminal_count {
        for b in a + 1..terminal_count {
            let clash = tokens[a]
                .iter()
                .any(|left| tokens[b].iter().any(|right| compete(left, right)));
            if clash {
                conflicts[a].insert(b);
                conflicts[b].insert(a);
            }
        }
    }
    conflicts
}

fn state_id(index: usize) -> Result<StateId, GenerateError> {
    StateId::try_from(index).map_err(|_| GenerateError::TooManyStates)
}

fn production_id(index: usize) -> Result<ProductionId, GenerateError> {
    ProductionId::try_from(index).map_err(|_| GenerateError::TooManyStates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::prepare::prepare;
    use crate::grammar::dsl::{
        choice, optional, pattern, prec_left, prec_right, repeat, seq, string, sym,
    };
    use crate::grammar::Grammar;

    fn arithmetic(plus: fn(i32, crate::Rule) -> crate::Rule) -> PreparedGrammar {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    plus(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
                    prec_left(2, seq(vec![sym("expr"), string("*"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        prepare(&grammar).unwrap()
    }

    /// Action lists of every terminal cell.
    fn terminal_cells<'t>(prepared: &PreparedGrammar, tables: &'t Tables) -> Vec<&'t [ParseAction]> {
        let symbol_count = prepared.symbols.len();
        tables
            .parse_table
            .chunks(symbol_count)
            .flat_map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(symbol, _)| prepared.is_terminal(*symbol as Symbol))
                    .map(|(_, &id)| tables.action_lists[id as usize].as_slice())
            })
            .collect()
    }

    #[test]
    fn test_precedence_resolves_every_conflict() {
        let prepared = arithmetic(prec_left);
        let tables = build(&prepared).unwrap();
        for actions in terminal_cells(&prepared, &tables) {
            assert!(actions.len() <= 1, "unexpected conflict: {actions:?}");
        }
        // state 0, symbol `number`
        let number = 3;
        assert!(matches!(
            tables.action_lists[tables.parse_table[number] as usize].as_slice(),
            [ParseAction::Shift(_)]
        ));
    }

    #[test]
    fn test_right_associativity_prefers_shift() {
        let prepared = arithmetic(prec_right);
        let tables = build(&prepared).unwrap();
        let plus = 1;
        let reduce_on_plus = tables
            .parse_table
            .chunks(prepared.symbols.len())
            .flat_map(|row| tables.action_lists[row[plus] as usize].iter())
            .filter(|action| match action {
                ParseAction::Reduce(p) => {
                    let steps = &prepared.productions[*p as usize].steps;
                    steps.len() == 3 && steps[1].symbol == plus as Symbol
                }
                _ => false,
            })
            .count();
        assert_eq!(reduce_on_plus, 0);
    }

    #[test]
    fn test_unresolved_conflict_keeps_both_actions() {
        let grammar = Grammar::new("ambiguous")
            .rule(
                "expr",
                choice(vec![seq(vec![sym("expr"), string("+"), sym("expr")]), sym("number")]),
            )
            .rule("number", pattern(r"\d+"))
            .conflict(&["expr"]);
        let prepared = prepare(&grammar).unwrap();
        let tables = build(&prepared).unwrap();
        assert!(tables
            .action_lists
            .iter()
            .any(|actions| actions.len() == 2));
    }

    #[test]
    fn test_nullable_start_accepts_empty_input() {
        let grammar = Grammar::new("list")
            .rule("list", crate::grammar::dsl::repeat(sym("item")))
            .rule("item", string("x"));
        let prepared = prepare(&grammar).unwrap();
        let tables = build(&prepared).unwrap();
        let end_actions = &tables.action_lists[tables.parse_table[0] as usize];
        assert!(matches!(end_actions.as_slice(), [ParseAction::Reduce(_)]));
    }

    #[test]
    fn test_shared_separator_keeps_contexts_apart() {
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
        let prepared = prepare(&grammar).unwrap();
        let tables = build(&prepared).unwrap();
        let symbol = |name: &str| {
            prepared
                .symbols
                .iter()
                .position(|info| info.name == name)
                .and_then(|index| Symbol::try_from(index).ok())
                .unwrap()
        };
        let (name, code, plus) = (symbol("name"), symbol("code"), symbol("+"));

        for valid in &tables.lex_states {
            assert!(!(valid.contains(&name) && valid.contains(&code)), "{valid:?}");
        }
        // The state after `,` exists once per list kind.
        let after_comma = tables
            .lex_states
            .iter()
            .filter(|valid| valid.contains(&plus))
            .count();
        assert_eq!(after_comma, 2);
    }

    #[test]
    fn test_literal_and_pattern_conflicts() {
        let grammar = Grammar::new("tokens")
            .rule(
                "root",
                seq(vec![sym("word"), string("do"), string("="), string("=="), sym("number")]),
            )
            .rule("word", pattern("[a-z]+"))
            .rule("number", pattern(r"\d+"));
        let prepared = prepare(&grammar).unwrap();
        let builder = Builder::new(&prepared);
        let symbol = |name: &str| {
            prepared
                .symbols
                .iter()
                .position(|info| info.name == name)
                .unwrap()
        };
        let conflicts = |a: &str, b: &str| builder.conflicts[symbol(a)].contains(symbol(b));
        assert!(conflicts("word", "do"));
        assert!(conflicts("do", "word"));
        assert!(conflicts("=", "=="));
        assert!(conflicts("word", "number"));
        assert!(!conflicts("number", "do"));
        assert!(!conflicts("word", "="));
    }
}
