// cvar.rs - console variables used to tune the collision model and tools

use std::collections::HashMap;
use tracing::{debug, warn};

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub value: f32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = value.parse::<f32>().unwrap_or(0.0);
    }
}

/// Registry of console variables, looked up by name.
#[derive(Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Floating point value of a cvar, 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// String value of a cvar, "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. An existing cvar keeps its value.
    pub fn get(&mut self, name: &str, value: &str) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            return idx;
        }

        let idx = self.cvar_vars.len();
        let mut var = Cvar {
            name: name.to_string(),
            string: String::new(),
            value: 0.0,
        };
        var.assign(value);
        self.cvar_vars.push(var);
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a cvar value, creating it if needed.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let Some(&idx) = self.cvar_index.get(name) else {
            return self.get(name, value);
        };
        let var = &mut self.cvar_vars[idx];
        if var.string != value {
            debug!("{} changed to \"{}\"", name, value);
            var.assign(value);
        }
        idx
    }

    /// Consumes Quake-style `+set name value` arguments, returning whatever
    /// arguments remain in order.
    pub fn apply_set_args<I>(&mut self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut rest = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "+set" {
                match (args.next(), args.next()) {
                    (Some(name), Some(value)) => {
                        self.set(&name, &value);
                    }
                    _ => warn!("+set requires a name and a value"),
                }
            } else {
                rest.push(arg);
            }
        }
        rest
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "42");
        assert_eq!(ctx.variable_value("test_var"), 42.0);
        assert_eq!(ctx.variable_string("test_var"), "42");
    }

    #[test]
    fn test_cvar_set() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10");
        ctx.set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_set_after_get_takes_effect_immediately() {
        let mut ctx = CvarContext::new();
        ctx.get("cm_leaf_list", "1024");
        ctx.set("cm_leaf_list", "64");
        assert_eq!(ctx.variable_value("cm_leaf_list"), 64.0);
        // re-registering keeps the set value
        ctx.get("cm_leaf_list", "1024");
        assert_eq!(ctx.variable_value("cm_leaf_list"), 64.0);
    }

    #[test]
    fn test_cvar_get_creates_once() {
        let mut ctx = CvarContext::new();
        let a = ctx.get("test", "1");
        let b = ctx.get("test", "2");
        assert_eq!(a, b);
        assert_eq!(ctx.variable_string("test"), "1");
        assert_eq!(ctx.cvar_vars.len(), 1);
    }

    #[test]
    fn test_cvar_non_numeric_value() {
        let mut ctx = CvarContext::new();
        ctx.set("name", "player");
        assert_eq!(ctx.variable_value("name"), 0.0);
        assert_eq!(ctx.variable_string("name"), "player");
    }

    #[test]
    fn test_cvar_not_found() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        assert_eq!(ctx.variable_string("nonexistent"), "");
    }

    #[test]
    fn test_apply_set_args() {
        let mut ctx = CvarContext::new();
        let args = ["+set", "developer", "1", "trace", "maps/q2dm1.bsp", "+set", "cm_trace_stats", "1"]
            .iter()
            .map(|s| s.to_string());
        let rest = ctx.apply_set_args(args);
        assert_eq!(rest, vec!["trace".to_string(), "maps/q2dm1.bsp".to_string()]);
        assert_eq!(ctx.variable_value("developer"), 1.0);
        assert_eq!(ctx.variable_value("cm_trace_stats"), 1.0);
    }

    #[test]
    fn test_apply_set_args_missing_value() {
        let mut ctx = CvarContext::new();
        let rest = ctx.apply_set_args(["info", "+set", "developer"].iter().map(|s| s.to_string()));
        assert_eq!(rest, vec!["info".to_string()]);
        assert!(ctx.find_var("developer").is_none());
    }
}
