// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Declarations an agent makes about its tools
//!
//! A `ToolSpec` names a function, the capability it provides, and the
//! `DependencySpec`s it needs filled in at call time. Both are immutable
//! once handed to the injector.

use std::collections::BTreeSet;

/// One capability a function needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    capability: String,
    version: Option<String>,
    tags: BTreeSet<String>,
    target_parameter: String,
    optional: bool,
}

impl DependencySpec {
    /// Required dependency injected into a parameter named after the capability
    pub fn new(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        Self {
            target_parameter: capability.clone(),
            capability,
            version: None,
            tags: BTreeSet::new(),
            optional: false,
        }
    }

    /// Version constraint, e.g. `>=1.2`
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Inject into `parameter` instead of the capability name
    pub fn for_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.target_parameter = parameter.into();
        self
    }

    /// Absence is expected and not reported as a health problem
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn target_parameter(&self) -> &str {
        &self.target_parameter
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// A function exposed by this agent, with its dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    function_name: String,
    capability: String,
    version: String,
    tags: BTreeSet<String>,
    dependencies: Vec<DependencySpec>,
}

impl ToolSpec {
    /// Tool providing a capability named after the function, version `1.0.0`
    pub fn new(function_name: impl Into<String>) -> Self {
        let function_name = function_name.into();
        Self {
            capability: function_name.clone(),
            function_name,
            version: "1.0.0".to_string(),
            tags: BTreeSet::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn provides(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Append a dependency. Declaration order is kept.
    pub fn depends_on(mut self, dependency: DependencySpec) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_defaults() {
        let dep = DependencySpec::new("date_service");
        assert_eq!(dep.target_parameter(), "date_service");
        assert!(!dep.is_optional());
        assert!(dep.version().is_none());
    }

    #[test]
    fn test_tool_builder_keeps_dependency_order() {
        let tool = ToolSpec::new("greet")
            .provides("greeting")
            .with_tag("demo")
            .depends_on(DependencySpec::new("date_service").for_parameter("today"))
            .depends_on(DependencySpec::new("weather").optional().with_tags(["eu", "fast"]));

        assert_eq!(tool.capability(), "greeting");
        let names: Vec<_> = tool.dependencies().iter().map(|d| d.capability()).collect();
        assert_eq!(names, vec!["date_service", "weather"]);
        assert_eq!(tool.dependencies()[0].target_parameter(), "today");
        assert_eq!(tool.dependencies()[1].tags().len(), 2);
    }
}
