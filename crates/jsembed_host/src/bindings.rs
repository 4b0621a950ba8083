use std::collections::BTreeMap;

/// Global names that expose a native module, kept apart from the module
/// registry itself: target name on `globalThis` to module name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalBindings {
    targets: BTreeMap<String, String>,
}

impl GlobalBindings {
    /// Records that `target` exposes `module`, returning the module it exposed before
    pub fn bind(&mut self, target: &str, module: &str) -> Option<String> {
        self.targets.insert(target.to_string(), module.to_string())
    }

    pub fn module_for(&self, target: &str) -> Option<&str> {
        self.targets.get(target).map(String::as_str)
    }

    /// Every global bound to `module`
    pub fn targets_of<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.targets
            .iter()
            .filter(move |(_, bound)| bound.as_str() == module)
            .map(|(target, _)| target.as_str())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_lookup() {
        let mut bindings = GlobalBindings::default();
        assert!(bindings.bind("fs", "fs").is_none());
        assert!(bindings.bind("files", "fs").is_none());
        assert_eq!(bindings.bind("fs", "vfs"), Some("fs".to_string()));

        assert_eq!(bindings.module_for("fs"), Some("vfs"));
        assert_eq!(bindings.targets_of("fs").collect::<Vec<_>>(), vec!["files"]);
        assert_eq!(bindings.len(), 2);

        bindings.clear();
        assert!(bindings.is_empty());
    }
}
