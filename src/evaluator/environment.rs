use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Symbol, Value};

#[derive(Default)]
struct Frame {
    bindings: HashMap<Symbol, Value>,
    parent: Option<Environment>,
}

/// A chained scope mapping symbols to values.
///
/// `Environment` is a cheap handle: clones share the same frame, which is how a
/// closure keeps its defining scope alive and sees later definitions made in it.
/// Lookup walks from this frame up through its parents; [`Environment::define`]
/// only ever writes to this frame.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

impl Environment {
    /// An empty root frame
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty frame whose lookups fall back to `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(parent.clone()),
            })),
        }
    }

    /// Bind `name` in this frame, replacing any existing binding in the same frame.
    pub fn define(&self, name: Symbol, value: Value) {
        self.frame.borrow_mut().bindings.insert(name, value);
    }

    /// Resolve `name`, innermost frame first.
    pub fn get(&self, name: &Symbol) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let frame = current.frame.borrow();
                if let Some(value) = frame.bindings.get(name) {
                    return Some(value.clone());
                }
                frame.parent.clone()
            };
            current = next?;
        }
    }

    /// True when `name` is bound in this frame itself
    #[cfg(test)]
    pub(crate) fn is_bound_locally(&self, name: &Symbol) -> bool {
        self.frame.borrow().bindings.contains_key(name)
    }

    /// Get all bindings visible from this environment.
    /// Returns a Vec of (name, value) pairs sorted by name; inner frames shadow outer ones.
    pub fn get_all_bindings(&self) -> Vec<(Symbol, Value)> {
        let frame = self.frame.borrow();
        let mut bindings: HashMap<Symbol, Value> = frame
            .parent
            .as_ref()
            .map(|parent| parent.get_all_bindings().into_iter().collect())
            .unwrap_or_default();

        for (name, value) in &frame.bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Number of frames from this one up to the root, inclusive
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self.frame.borrow().parent.clone();
        while let Some(env) = current {
            depth += 1;
            current = env.frame.borrow().parent.clone();
        }
        depth
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

// Bindings can hold closures that point back at this frame, so only names are shown.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.frame.borrow();
        let mut names: Vec<&Symbol> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::val;

    fn name(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn test_lookup_walks_to_root() {
        let global = Environment::new();
        global.define(name("x"), val(1));
        let middle = Environment::with_parent(&global);
        let inner = Environment::with_parent(&middle);

        assert_eq!(inner.get(&name("x")), Some(val(1)));
        assert_eq!(inner.get(&name("y")), None);
        assert_eq!(inner.depth(), 3);
    }

    #[test]
    fn test_define_writes_local_frame_only() {
        let global = Environment::new();
        global.define(name("x"), val(1));
        let child = Environment::with_parent(&global);
        child.define(name("x"), val(2));

        assert_eq!(child.get(&name("x")), Some(val(2)));
        assert_eq!(global.get(&name("x")), Some(val(1)));
        assert!(child.is_bound_locally(&name("x")));
        assert!(!Environment::with_parent(&global).is_bound_locally(&name("x")));
    }

    #[test]
    fn test_redefine_overwrites_in_same_frame() {
        let env = Environment::new();
        env.define(name("a"), val(1));
        env.define(name("a"), val("two"));
        assert_eq!(env.get(&name("a")), Some(val("two")));
    }

    #[test]
    fn test_clones_share_frame() {
        let env = Environment::new();
        let alias = env.clone();
        alias.define(name("late"), val(true));

        assert_eq!(env.get(&name("late")), Some(val(true)));
        assert_eq!(env, alias);
        assert_ne!(env, Environment::new());
    }

    #[test]
    fn test_parent_definitions_are_visible_after_child_creation() {
        let global = Environment::new();
        let child = Environment::with_parent(&global);
        global.define(name("later"), val(5));
        assert_eq!(child.get(&name("later")), Some(val(5)));
    }

    #[test]
    fn test_get_all_bindings_sorted_and_shadowed() {
        let global = Environment::new();
        global.define(name("b"), val(1));
        global.define(name("a"), val(2));
        let child = Environment::with_parent(&global);
        child.define(name("b"), val(3));

        let names_and_values: Vec<(String, Value)> = child
            .get_all_bindings()
            .into_iter()
            .map(|(n, v)| (n.name().to_owned(), v))
            .collect();
        assert_eq!(
            names_and_values,
            vec![("a".to_owned(), val(2)), ("b".to_owned(), val(3))]
        );
    }
}
