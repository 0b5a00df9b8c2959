//! Lowers a [`Grammar`] into numbered symbols, flat productions and lexical rules.

use super::GenerateError;
use crate::grammar::{Grammar, Rule, RuleType, RuleValue};
use crate::language::{FieldId, LexRule, Symbol, SymbolInfo, SymbolKind, TokenMatcher, END_SYMBOL};
use rustc_hash::{FxHashMap, FxHashSet};

const MAX_ALTERNATIVES: usize = 1 << 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct Step {
    pub symbol: Symbol,
    pub precedence: Option<i32>,
    pub associativity: Option<Associativity>,
    pub field: Option<FieldId>,
    pub alias: Option<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
struct Alternative {
    steps: Vec<Step>,
    precedence: Option<i32>,
    associativity: Option<Associativity>,
    dynamic_precedence: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Production {
    pub lhs: Symbol,
    pub steps: Vec<Step>,
    pub precedence: i32,
    pub associativity: Option<Associativity>,
    pub dynamic_precedence: i32,
}

#[derive(Debug)]
pub(super) struct PreparedGrammar {
    pub symbols: Vec<SymbolInfo>,
    /// Rule that owns each symbol; repetition helpers point at their rule.
    pub owners: Vec<Symbol>,
    pub productions: Vec<Production>,
    pub start: Symbol,
    pub lex_rules: Vec<LexRule>,
    pub extras: Vec<Symbol>,
    pub externals: Vec<Symbol>,
    pub fields: Vec<String>,
    pub word: Option<Symbol>,
    pub expected_conflicts: Vec<Vec<Symbol>>,
}

impl PreparedGrammar {
    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        self.symbols.get(usize::from(symbol)).is_some_and(|info| {
            matches!(
                info.kind,
                SymbolKind::End | SymbolKind::Terminal | SymbolKind::External
            )
        })
    }

    pub fn name(&self, symbol: Symbol) -> &str {
        self.symbols
            .get(usize::from(symbol))
            .map_or("?", |info| info.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    matcher: TokenMatcher,
    precedence: i32,
    immediate: bool,
}

struct Preparer<'g> {
    grammar: &'g Grammar,
    symbols: Vec<SymbolInfo>,
    owners: Vec<Symbol>,
    lex_rules: Vec<LexRule>,
    anonymous_tokens: FxHashMap<TokenKey, Symbol>,
    hidden_tokens: usize,
    named: FxHashMap<String, Symbol>,
    inline: FxHashSet<&'g str>,
    inline_stack: Vec<String>,
    fields: Vec<String>,
    field_ids: FxHashMap<String, FieldId>,
    precedence_levels: FxHashMap<String, i32>,
    productions: Vec<Production>,
    current_rule: Symbol,
    aux_count: FxHashMap<Symbol, usize>,
}

pub(super) fn prepare(grammar: &Grammar) -> Result<PreparedGrammar, GenerateError> {
    let start_name = grammar.start_rule().ok_or(GenerateError::EmptyGrammar)?;
    let start_rule = grammar
        .rules
        .get(start_name)
        .ok_or_else(|| GenerateError::UndefinedSymbol(start_name.to_string()))?;
    if start_rule.is_terminal() {
        return Err(GenerateError::TokenStartRule(start_name.to_string()));
    }

    let mut preparer = Preparer {
        grammar,
        symbols: vec![SymbolInfo {
            name: "end".into(),
            named: false,
            visible: false,
            kind: SymbolKind::End,
        }],
        owners: vec![END_SYMBOL],
        lex_rules: Vec::new(),
        anonymous_tokens: FxHashMap::default(),
        hidden_tokens: 0,
        named: FxHashMap::default(),
        inline: grammar.inline.iter().flatten().map(String::as_str).collect(),
        inline_stack: Vec::new(),
        fields: Vec::new(),
        field_ids: FxHashMap::default(),
        precedence_levels: precedence_levels(grammar),
        productions: Vec::new(),
        current_rule: END_SYMBOL,
        aux_count: FxHashMap::default(),
    };

    let externals = preparer.intern_externals()?;
    preparer.intern_tokens()?;
    let extras = preparer.intern_extras()?;
    let start = preparer.intern_nonterminals(start_name)?;
    preparer.flatten_rules()?;

    let word = match &grammar.word {
        Some(name) => Some(
            preparer
                .named
                .get(name)
                .copied()
                .filter(|&symbol| preparer.is_lexical(symbol))
                .ok_or_else(|| GenerateError::InvalidWord(name.clone()))?,
        ),
        None => None,
    };

    let mut expected_conflicts = Vec::new();
    for group in grammar.conflicts.iter().flatten() {
        let symbols = group
            .iter()
            .map(|name| {
                preparer
                    .named
                    .get(name)
                    .copied()
                    .ok_or_else(|| GenerateError::UndefinedSymbol(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        expected_conflicts.push(symbols);
    }

    Ok(PreparedGrammar {
        symbols: preparer.symbols,
        owners: preparer.owners,
        productions: preparer.productions,
        start,
        lex_rules: preparer.lex_rules,
        extras,
        externals,
        fields: preparer.fields,
        word,
        expected_conflicts,
    })
}

fn precedence_levels(grammar: &Grammar) -> FxHashMap<String, i32> {
    let mut levels = FxHashMap::default();
    for list in grammar.precedences.iter().flatten() {
        let len = i32::try_from(list.len()).unwrap_or(i32::MAX);
        for (index, entry) in (0_i32..).zip(list) {
            if let Some(name) = entry.string_value().or_else(|| entry.symbol_name()) {
                levels.entry(name.to_string()).or_insert(len - index);
            }
        }
    }
    levels
}

fn value_text(rule: &Rule) -> Result<&str, GenerateError> {
    match &rule.value {
        Some(RuleValue::String(text)) => Ok(text),
        _ => Err(GenerateError::MissingValue(rule.type_name())),
    }
}

fn content(rule: &Rule) -> Result<&Rule, GenerateError> {
    rule.content
        .as_deref()
        .ok_or(GenerateError::MissingContent(rule.type_name()))
}

fn pattern_source(rule: &Rule) -> Result<String, GenerateError> {
    let source = value_text(rule)?;
    Ok(match rule.flags.as_deref() {
        Some(flags) if flags.contains('i') => format!("(?i:{source})"),
        _ => format!("(?:{source})"),
    })
}

impl Preparer<'_> {
    fn push_symbol(&mut self, name: String, named: bool, visible: bool, kind: SymbolKind) -> Result<Symbol, GenerateError> {
        let symbol = Symbol::try_from(self.symbols.len())
            .ok()
            .filter(|&symbol| symbol < crate::language::ERROR_SYMBOL)
            .ok_or(GenerateError::TooManySymbols)?;
        self.symbols.push(SymbolInfo {
            name,
            named,
            visible,
            kind,
        });
        self.owners.push(if self.current_rule == END_SYMBOL {
            symbol
        } else {
            self.current_rule
        });
        Ok(symbol)
    }

    fn is_lexical(&self, symbol: Symbol) -> bool {
        self.symbols
            .get(usize::from(symbol))
            .is_some_and(|info| matches!(info.kind, SymbolKind::Terminal | SymbolKind::External))
    }

    fn intern_externals(&mut self) -> Result<Vec<Symbol>, GenerateError> {
        let mut externals = Vec::new();
        for rule in self.grammar.externals.iter().flatten() {
            let (name, named) = match rule.rule_type {
                RuleType::Symbol => (rule.name.clone().unwrap_or_default(), true),
                RuleType::String => (value_text(rule)?.to_string(), false),
                _ => return Err(GenerateError::InvalidExternal(rule.type_name())),
            };
            let visible = !(named && name.starts_with('_'));
            let symbol = self.push_symbol(name.clone(), named, visible, SymbolKind::External)?;
            if named {
                self.named.insert(name, symbol);
            }
            externals.push(symbol);
        }
        Ok(externals)
    }

    /// Converts the content of a token into a matcher, collecting lexical precedence.
    fn lexical(rule: &Rule, precedence: &mut i32) -> Result<TokenMatcher, GenerateError> {
        match rule.rule_type {
            RuleType::String => Ok(TokenMatcher::Literal(value_text(rule)?.to_string())),
            RuleType::Token | RuleType::ImmediateToken => Self::lexical(content(rule)?, precedence),
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight => {
                if let Some(level) = rule.precedence() {
                    *precedence = level;
                }
                Self::lexical(content(rule)?, precedence)
            }
            _ => Ok(TokenMatcher::Pattern(Self::regex(rule, precedence)?)),
        }
    }

    fn regex(rule: &Rule, precedence: &mut i32) -> Result<String, GenerateError> {
        Ok(match rule.rule_type {
            RuleType::String => regex::escape(value_text(rule)?),
            RuleType::Pattern => pattern_source(rule)?,
            RuleType::Blank => String::new(),
            RuleType::Seq => rule
                .members
                .iter()
                .map(|member| Self::regex(member, precedence))
                .collect::<Result<Vec<_>, _>>()?
                .concat(),
            RuleType::Choice => format!(
                "(?:{})",
                rule.members
                    .iter()
                    .map(|member| Self::regex(member, precedence))
                    .collect::<Result<Vec<_>, _>>()?
                    .join("|")
            ),
            RuleType::Repeat => format!("(?:{})*", Self::regex(content(rule)?, precedence)?),
            RuleType::Repeat1 => format!("(?:{})+", Self::regex(content(rule)?, precedence)?),
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight => {
                if let Some(level) = rule.precedence() {
                    *precedence = level;
                }
                Self::regex(content(rule)?, precedence)?
            }
            RuleType::Token | RuleType::ImmediateToken | RuleType::Reserved => {
                Self::regex(content(rule)?, precedence)?
            }
            RuleType::Symbol
            | RuleType::Field
            | RuleType::Alias
            | RuleType::PrecDynamic => {
                return Err(GenerateError::NonLexicalToken(rule.type_name()));
            }
        })
    }

    fn token_key(rule: &Rule) -> Result<TokenKey, GenerateError> {
        let mut precedence = 0;
        let matcher = match rule.rule_type {
            RuleType::Pattern => TokenMatcher::Pattern(pattern_source(rule)?),
            _ => Self::lexical(rule, &mut precedence)?,
        };
        Ok(TokenKey {
            matcher,
            precedence,
            immediate: matches!(rule.rule_type, RuleType::ImmediateToken),
        })
    }

    fn add_token(&mut self, key: TokenKey, name: String, named: bool, visible: bool) -> Result<Symbol, GenerateError> {
        let symbol = self.push_symbol(name, named, visible, SymbolKind::Terminal)?;
        self.lex_rules.push(LexRule {
            symbol,
            matcher: key.matcher,
            precedence: key.precedence,
            immediate: key.immediate,
        });
        Ok(symbol)
    }

    fn intern_anonymous(&mut self, rule: &Rule) -> Result<Symbol, GenerateError> {
        let key = Self::token_key(rule)?;
        if let Some(&symbol) = self.anonymous_tokens.get(&key) {
            return Ok(symbol);
        }
        let (name, visible) = match &key.matcher {
            TokenMatcher::Literal(text) => (text.clone(), true),
            TokenMatcher::Pattern(_) => {
                self.hidden_tokens += 1;
                (format!("_token{}", self.hidden_tokens), false)
            }
        };
        let symbol = self.add_token(key.clone(), name, false, visible)?;
        self.anonymous_tokens.insert(key, symbol);
        Ok(symbol)
    }

    fn intern_named_token(&mut self, name: &str) -> Result<Symbol, GenerateError> {
        if let Some(&symbol) = self.named.get(name) {
            return Ok(symbol);
        }
        let rule = self
            .grammar
            .rules
            .get(name)
            .ok_or_else(|| GenerateError::UndefinedSymbol(name.to_string()))?;
        let key = Self::token_key(rule)?;
        let symbol = self.add_token(key, name.to_string(), true, !name.starts_with('_'))?;
        self.named.insert(name.to_string(), symbol);
        Ok(symbol)
    }

    fn is_token_rule(&self, name: &str) -> bool {
        self.grammar
            .rules
            .get(name)
            .is_some_and(Rule::is_terminal)
    }

    /// Numbers terminals in order of first appearance over the rules.
    fn intern_tokens(&mut self) -> Result<(), GenerateError> {
        let grammar = self.grammar;
        for (name, rule) in &grammar.rules {
            if self.named.contains_key(name) {
                continue;
            }
            if rule.is_terminal() {
                self.intern_named_token(name)?;
            } else {
                self.collect_tokens(rule)?;
            }
        }
        Ok(())
    }

    fn collect_tokens(&mut self, rule: &Rule) -> Result<(), GenerateError> {
        match rule.rule_type {
            RuleType::String | RuleType::Pattern | RuleType::Token | RuleType::ImmediateToken => {
                self.intern_anonymous(rule)?;
            }
            RuleType::Symbol => {
                if let Some(name) = rule.name.as_deref() {
                    if self.is_token_rule(name) {
                        self.intern_named_token(name)?;
                    }
                }
            }
            _ => {
                for child in rule.children() {
                    self.collect_tokens(child)?;
                }
            }
        }
        Ok(())
    }

    fn intern_extras(&mut self) -> Result<Vec<Symbol>, GenerateError> {
        let mut extras = Vec::new();
        for rule in self.grammar.effective_extras() {
            let symbol = match rule.rule_type {
                RuleType::Symbol => {
                    let name = rule.name.as_deref().unwrap_or_default();
                    match self.named.get(name).copied() {
                        Some(symbol) if self.is_lexical(symbol) => symbol,
                        _ if self.is_token_rule(name) => self.intern_named_token(name)?,
                        _ => return Err(GenerateError::NonTokenExtra(name.to_string())),
                    }
                }
                _ if rule.is_terminal() => self.intern_anonymous(&rule)?,
                _ => return Err(GenerateError::NonTokenExtra(rule.type_name().to_string())),
            };
            extras.push(symbol);
        }
        Ok(extras)
    }

    fn intern_nonterminals(&mut self, start_name: &str) -> Result<Symbol, GenerateError> {
        let grammar = self.grammar;
        let mut names: Vec<&str> = vec![start_name];
        names.extend(
            grammar
                .rules
                .keys()
                .map(String::as_str)
                .filter(|name| *name != start_name),
        );
        for name in names {
            if self.named.contains_key(name) || self.inline.contains(name) {
                continue;
            }
            let visible = name == start_name || !name.starts_with('_');
            let symbol = self.push_symbol(name.to_string(), true, visible, SymbolKind::NonTerminal)?;
            self.named.insert(name.to_string(), symbol);
        }
        self.named
            .get(start_name)
            .copied()
            .ok_or_else(|| GenerateError::UndefinedSymbol(start_name.to_string()))
    }

    fn flatten_rules(&mut self) -> Result<(), GenerateError> {
        let grammar = self.grammar;
        for (name, rule) in &grammar.rules {
            let Some(&symbol) = self.named.get(name) else {
                continue;
            };
            if self.is_lexical(symbol) {
                continue;
            }
            self.current_rule = symbol;
            let alternatives = self.flatten(rule)?;
            self.add_productions(symbol, alternatives);
        }
        self.current_rule = END_SYMBOL;
        Ok(())
    }

    fn add_productions(&mut self, lhs: Symbol, alternatives: Vec<Alternative>) {
        let mut seen = FxHashSet::default();
        for alternative in alternatives {
            if !seen.insert(alternative.clone()) {
                continue;
            }
            let (precedence, associativity) = alternative.steps.last().map_or(
                (alternative.precedence, alternative.associativity),
                |step| {
                    (
                        step.precedence.or(alternative.precedence),
                        step.associativity.or(alternative.associativity),
                    )
                },
            );
            self.productions.push(Production {
                lhs,
                steps: alternative.steps,
                precedence: precedence.unwrap_or(0),
                associativity,
                dynamic_precedence: alternative.dynamic_precedence,
            });
        }
    }

    fn step(symbol: Symbol) -> Alternative {
        Alternative {
            steps: vec![Step {
                symbol,
                precedence: None,
                associativity: None,
                field: None,
                alias: None,
            }],
            ..Alternative::default()
        }
    }

    fn field_id(&mut self, name: &str) -> Result<FieldId, GenerateError> {
        if let Some(&id) = self.field_ids.get(name) {
            return Ok(id);
        }
        let id = FieldId::try_from(self.fields.len()).map_err(|_| GenerateError::TooManySymbols)?;
        self.fields.push(name.to_string());
        self.field_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn alias_symbol(&mut self, name: &str, named: bool) -> Result<Symbol, GenerateError> {
        let existing = self.symbols.iter().position(|info| {
            info.name == name && info.named == named && info.visible && info.kind != SymbolKind::End
        });
        if let Some(index) = existing {
            return Symbol::try_from(index).map_err(|_| GenerateError::TooManySymbols);
        }
        self.push_symbol(name.to_string(), named, true, SymbolKind::Alias)
    }

    fn auxiliary(&mut self, suffix: &str) -> Result<Symbol, GenerateError> {
        let owner = self.current_rule;
        let count = self.aux_count.entry(owner).or_insert(0);
        *count += 1;
        let name = format!("{}_{suffix}{count}", self.symbols[usize::from(owner)].name);
        self.push_symbol(name, false, false, SymbolKind::Auxiliary)
    }

    fn precedence_value(&self, rule: &Rule) -> Result<i32, GenerateError> {
        if let Some(level) = rule.precedence() {
            return Ok(level);
        }
        match rule.precedence_name() {
            Some(name) => self
                .precedence_levels
                .get(name)
                .copied()
                .ok_or_else(|| GenerateError::UndefinedPrecedence(name.to_string())),
            None => Ok(0),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn flatten(&mut self, rule: &Rule) -> Result<Vec<Alternative>, GenerateError> {
        match rule.rule_type {
            RuleType::Blank => Ok(vec![Alternative::default()]),
            RuleType::String | RuleType::Pattern | RuleType::Token | RuleType::ImmediateToken => {
                let symbol = self.intern_anonymous(rule)?;
                Ok(vec![Self::step(symbol)])
            }
            RuleType::Symbol => {
                let name = rule.name.as_deref().unwrap_or_default();
                if self.inline.contains(name) {
                    if self.inline_stack.iter().any(|entry| entry == name) {
                        return Err(GenerateError::RecursiveInline(name.to_string()));
                    }
                    let grammar = self.grammar;
                    let body = grammar
                        .rules
                        .get(name)
                        .ok_or_else(|| GenerateError::UndefinedSymbol(name.to_string()))?;
                    self.inline_stack.push(name.to_string());
                    let result = self.flatten(body);
                    self.inline_stack.pop();
                    return result;
                }
                let symbol = self
                    .named
                    .get(name)
                    .copied()
                    .ok_or_else(|| GenerateError::UndefinedSymbol(name.to_string()))?;
                Ok(vec![Self::step(symbol)])
            }
            RuleType::Seq => {
                let mut result = vec![Alternative::default()];
                for member in &rule.members {
                    let tails = self.flatten(member)?;
                    if result.len() * tails.len() > MAX_ALTERNATIVES {
                        return Err(GenerateError::TooManyAlternatives(
                            self.symbols[usize::from(self.current_rule)].name.clone(),
                        ));
                    }
                    let mut next = Vec::with_capacity(result.len() * tails.len());
                    for head in &result {
                        for tail in &tails {
                            let mut combined = head.clone();
                            combined.steps.extend(tail.steps.iter().cloned());
                            combined.dynamic_precedence =
                                combined.dynamic_precedence.max(tail.dynamic_precedence);
                            next.push(combined);
                        }
                    }
                    result = next;
                }
                Ok(result)
            }
            RuleType::Choice => {
                let mut result = Vec::new();
                for member in &rule.members {
                    result.extend(self.flatten(member)?);
                }
                if result.len() > MAX_ALTERNATIVES {
                    return Err(GenerateError::TooManyAlternatives(
                        self.symbols[usize::from(self.current_rule)].name.clone(),
                    ));
                }
                Ok(result)
            }
            RuleType::Repeat | RuleType::Repeat1 => {
                let body = self.flatten(content(rule)?)?;
                let helper = self.auxiliary("repeat")?;
                let mut helper_alternatives = Vec::with_capacity(body.len() * 2);
                for alternative in &body {
                    let mut recursive = Self::step(helper);
                    recursive.steps.extend(alternative.steps.iter().cloned());
                    recursive.dynamic_precedence = alternative.dynamic_precedence;
                    helper_alternatives.push(recursive);
                    helper_alternatives.push(alternative.clone());
                }
                self.add_productions(helper, helper_alternatives);
                let mut result = vec![Self::step(helper)];
                if matches!(rule.rule_type, RuleType::Repeat) {
                    result.push(Alternative::default());
                }
                Ok(result)
            }
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight => {
                let level = self.precedence_value(rule)?;
                let associativity = match rule.rule_type {
                    RuleType::PrecLeft => Some(Associativity::Left),
                    RuleType::PrecRight => Some(Associativity::Right),
                    _ => None,
                };
                let mut alternatives = self.flatten(content(rule)?)?;
                for alternative in &mut alternatives {
                    if alternative.precedence.is_none() {
                        alternative.precedence = Some(level);
                        alternative.associativity = associativity;
                    }
                    for step in &mut alternative.steps {
                        if step.precedence.is_none() {
                            step.precedence = Some(level);
                            step.associativity = associativity;
                        }
                    }
                }
                Ok(alternatives)
            }
            RuleType::PrecDynamic => {
                let level = self.precedence_value(rule)?;
                let mut alternatives = self.flatten(content(rule)?)?;
                for alternative in &mut alternatives {
                    if alternative.dynamic_precedence == 0 {
                        alternative.dynamic_precedence = level;
                    }
                }
                Ok(alternatives)
            }
            RuleType::Field => {
                let name = rule
                    .name
                    .as_deref()
                    .ok_or(GenerateError::MissingValue("FIELD"))?;
                let id = self.field_id(name)?;
                let mut alternatives = self.flatten(content(rule)?)?;
                for step in alternatives.iter_mut().flat_map(|alt| alt.steps.iter_mut()) {
                    step.field.get_or_insert(id);
                }
                Ok(alternatives)
            }
            RuleType::Alias => {
                let name = value_text(rule)?.to_string();
                let alias = self.alias_symbol(&name, rule.named.unwrap_or(false))?;
                let mut alternatives = self.flatten(content(rule)?)?;
                if alternatives.iter().all(|alt| alt.steps.len() == 1) {
                    for step in alternatives.iter_mut().flat_map(|alt| alt.steps.iter_mut()) {
                        step.alias.get_or_insert(alias);
                    }
                    return Ok(alternatives);
                }
                let helper = self.auxiliary("alias")?;
                self.add_productions(helper, alternatives);
                let mut wrapped = Self::step(helper);
                wrapped.steps[0].alias = Some(alias);
                Ok(vec![wrapped])
            }
            RuleType::Reserved => self.flatten(content(rule)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{
        alias, choice, field, optional, pattern, prec_left, repeat, seq, string, sym, token,
    };

    fn names(prepared: &PreparedGrammar) -> Vec<&str> {
        prepared.symbols.iter().map(|info| info.name.as_str()).collect()
    }

    #[test]
    fn test_symbols_are_numbered_deterministically() {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        let prepared = prepare(&grammar).unwrap();
        assert_eq!(names(&prepared), ["end", "+", "number", "_token1", "expr"]);
        assert_eq!(prepared.start, 4);
        assert_eq!(prepared.extras, vec![3]);
        assert_eq!(prepared.productions.len(), 2);
        assert_eq!(prepared.productions[0].precedence, 1);
        assert_eq!(prepared.productions[0].associativity, Some(Associativity::Left));
    }

    #[test]
    fn test_repeat_creates_hidden_helper() {
        let grammar = Grammar::new("list")
            .rule("list", repeat(sym("item")))
            .rule("item", string("x"));
        let prepared = prepare(&grammar).unwrap();
        let helper = prepared
            .symbols
            .iter()
            .position(|info| info.name == "list_repeat1")
            .unwrap();
        assert!(!prepared.symbols[helper].visible);
        assert_eq!(prepared.owners[helper], prepared.start);
        // list -> helper | ε ; helper -> helper item | item
        assert_eq!(prepared.productions.len(), 4);
    }

    #[test]
    fn test_fields_and_aliases_attach_to_steps() {
        let grammar = Grammar::new("call")
            .rule(
                "call",
                seq(vec![
                    field("function", sym("identifier")),
                    alias(string("("), "open", false),
                    optional(sym("identifier")),
                    string(")"),
                ]),
            )
            .rule("identifier", pattern("[a-z]+"));
        let prepared = prepare(&grammar).unwrap();
        assert_eq!(prepared.fields, ["function"]);
        let production = &prepared.productions[0];
        assert_eq!(production.steps[0].field, Some(0));
        let open = production.steps[1].alias.unwrap();
        assert_eq!(prepared.name(open), "open");
    }

    #[test]
    fn test_repeated_literal_shares_one_terminal() {
        let grammar = Grammar::new("pair")
            .rule("pair", seq(vec![sym("name"), string(","), sym("name"), string(",")]))
            .rule("name", pattern("[a-z]+"));
        let prepared = prepare(&grammar).unwrap();
        let commas = names(&prepared).iter().filter(|name| **name == ",").count();
        assert_eq!(commas, 1);
        let steps = &prepared.productions[0].steps;
        assert_eq!(steps[1].symbol, steps[3].symbol);
    }

    #[test]
    fn test_token_content_becomes_one_pattern() {
        let grammar = Grammar::new("t").rule(
            "doc",
            seq(vec![token(seq(vec![string("<"), pattern("[a-z]+")])), string(";")]),
        );
        let prepared = prepare(&grammar).unwrap();
        let rule = &prepared.lex_rules[0];
        assert_eq!(rule.matcher, TokenMatcher::Pattern("<(?:[a-z]+)".into()));
    }

    #[test]
    fn test_symbol_inside_token_is_rejected() {
        let grammar = Grammar::new("w")
            .rule("w", seq(vec![sym("doc")]))
            .rule("doc", token(seq(vec![sym("x")])))
            .rule("x", string("x"));
        assert!(matches!(
            prepare(&grammar),
            Err(GenerateError::NonLexicalToken("SYMBOL"))
        ));
    }
}
