use crate::ir::{Body, ComponentIR, DirectiveNode, EffectKind, StateDirective, TemplateNode};

/// The IrVisitor trait is the single traversal mechanism for component IR.
///
/// Rules:
/// 1. Traversal order is fixed: template nodes first, then directives, both in
///    document order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to keep descending
///    unless pruning is intended.
pub trait IrVisitor {
    fn visit_component(&mut self, ir: &ComponentIR) {
        walk_component(self, ir);
    }

    fn visit_body(&mut self, body: &Body) {
        walk_body(self, body);
    }

    fn visit_template(&mut self, _node: &TemplateNode) {
        // Leaf as far as directives are concerned
    }

    fn visit_directive(&mut self, directive: &DirectiveNode) {
        walk_directive(self, directive);
    }

    fn visit_state(&mut self, _state: &StateDirective) {}
}

pub fn walk_component<V: IrVisitor + ?Sized>(visitor: &mut V, ir: &ComponentIR) {
    for node in &ir.template_nodes {
        visitor.visit_template(node);
    }
    for directive in &ir.directives {
        visitor.visit_directive(directive);
    }
}

pub fn walk_body<V: IrVisitor + ?Sized>(visitor: &mut V, body: &Body) {
    for node in &body.template {
        visitor.visit_template(node);
    }
    for directive in &body.directives {
        visitor.visit_directive(directive);
    }
}

pub fn walk_directive<V: IrVisitor + ?Sized>(visitor: &mut V, directive: &DirectiveNode) {
    match directive {
        DirectiveNode::Loop(l) => visitor.visit_body(&l.body),
        DirectiveNode::Condition(c) => {
            visitor.visit_body(&c.when_true);
            if let Some(body) = &c.when_false {
                visitor.visit_body(body);
            }
        }
        DirectiveNode::Switch(s) => {
            for case in &s.cases {
                visitor.visit_body(&case.body);
            }
            if let Some(body) = &s.default {
                visitor.visit_body(body);
            }
        }
        DirectiveNode::While(w) => visitor.visit_body(&w.body),
        DirectiveNode::Event(e) => {
            for nested in &e.nested_directives {
                visitor.visit_directive(nested);
            }
        }
        DirectiveNode::Append(a) => visitor.visit_body(&a.body),
        DirectiveNode::KeyedList(k) => visitor.visit_body(&k.body),
        DirectiveNode::State(s) => visitor.visit_state(s),
        DirectiveNode::Visibility(_)
        | DirectiveNode::Attribute(_)
        | DirectiveNode::Bind(_)
        | DirectiveNode::Class(_)
        | DirectiveNode::Style(_)
        | DirectiveNode::Effect(_)
        | DirectiveNode::RawStatement(_) => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTORS
// ═══════════════════════════════════════════════════════════════════════════════

/// What the emitted class needs beyond its own render body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveCensus {
    /// References `window.__htms` (bind, effects, keyed lists).
    pub needs_runtime: bool,
    /// Calls `initState`/`setState`/`pushState`/`spliceState`.
    pub needs_state_helpers: bool,
    pub directive_count: usize,
}

impl IrVisitor for DirectiveCensus {
    fn visit_directive(&mut self, directive: &DirectiveNode) {
        self.directive_count += 1;
        match directive {
            DirectiveNode::Bind(_) | DirectiveNode::KeyedList(_) => self.needs_runtime = true,
            DirectiveNode::Effect(effect) => {
                self.needs_runtime = true;
                if matches!(effect.kind, EffectKind::Fetch { .. }) {
                    self.needs_state_helpers = true;
                }
            }
            _ => {}
        }
        walk_directive(self, directive);
    }

    fn visit_state(&mut self, _state: &StateDirective) {
        self.needs_state_helpers = true;
    }
}

pub fn census(ir: &ComponentIR) -> DirectiveCensus {
    let mut census = DirectiveCensus::default();
    census.visit_component(ir);
    census
}

#[derive(Default)]
struct MutationFinder {
    found: bool,
}

impl IrVisitor for MutationFinder {
    fn visit_state(&mut self, state: &StateDirective) {
        if state.is_mutation() {
            self.found = true;
        }
    }
}

/// Does any directive in `directives`, at any depth, mutate state?
pub fn contains_state_mutation(directives: &[DirectiveNode]) -> bool {
    let mut finder = MutationFinder::default();
    for directive in directives {
        finder.visit_directive(directive);
    }
    finder.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BindDirective, ConditionDirective, SetOperator, StateMode};

    fn set_count() -> DirectiveNode {
        let mut state = StateDirective::new(StateMode::Set, vec!["count".to_string()]);
        state.op = Some(SetOperator::Increment);
        DirectiveNode::State(state)
    }

    #[test]
    fn test_census_sees_nested_state() {
        let ir = ComponentIR {
            template_nodes: vec![],
            directives: vec![DirectiveNode::Condition(ConditionDirective {
                condition: "true".to_string(),
                when_true: Body::wrapping(set_count()),
                when_false: None,
            })],
        };
        let usage = census(&ir);
        assert!(usage.needs_state_helpers);
        assert!(!usage.needs_runtime);
        assert_eq!(usage.directive_count, 2);
    }

    #[test]
    fn test_census_runtime_usage() {
        let ir = ComponentIR {
            template_nodes: vec![],
            directives: vec![DirectiveNode::Bind(BindDirective {
                selector: "#out".to_string(),
                property: "textContent".to_string(),
                expr: "this.count".to_string(),
            })],
        };
        assert!(census(&ir).needs_runtime);
    }

    #[test]
    fn test_mutation_finder_ignores_init() {
        let init = DirectiveNode::State(StateDirective::new(
            StateMode::Init,
            vec!["count".to_string()],
        ));
        assert!(!contains_state_mutation(&[init]));
        assert!(contains_state_mutation(&[set_count()]));
    }
}
