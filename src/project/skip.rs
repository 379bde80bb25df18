//! Skip rules: the predicate oracle deciding which symbols are exempt from renaming.
//!
//! The rule language is a closed set of tagged matcher variants (literal name, regular
//! expression, visibility, declaring-type pattern) evaluated by pattern matching; the
//! rename orchestrator only ever consumes the boolean answer and supplies its own reason
//! string. Rules are per module, loaded from the project descriptor; on top of them sits
//! a forced-skip set that couples accessor methods to their skipped property or event
//! (one-way: skipping a property forces its accessors, never the reverse).

use std::collections::HashSet;

use bitflags::bitflags;
use regex::Regex;

use crate::{
    metadata::{EventKey, FieldKey, MethodKey, PropertyKey, TypeKey},
    Error, Result,
};

/// A name matcher: the `name=` / `rx=` halves of a rule.
#[derive(Debug, Clone)]
pub enum NamePattern {
    /// Matches any name
    Any,
    /// Exact match
    Literal(String),
    /// Regular-expression match
    Regex(Regex),
}

impl NamePattern {
    /// Compile a regex pattern.
    ///
    /// # Errors
    /// Returns [`Error::Pattern`] when the expression does not parse.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(NamePattern::Regex)
            .map_err(|e| Error::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    /// Whether `name` matches this pattern.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Literal(expected) => expected == name,
            NamePattern::Regex(re) => re.is_match(name),
        }
    }
}

/// Visibility constraint of a rule (`attrib="public"` in the descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Rule applies to public symbols only
    Public,
}

impl Visibility {
    /// Whether a symbol with the given publicness satisfies this constraint.
    #[must_use]
    pub fn admits(&self, is_public: bool) -> bool {
        match self {
            Visibility::Public => is_public,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Member kinds a type-level rule extends to.
    pub struct TypeSkipFlags: u8 {
        /// Also skip the type's methods
        const METHOD = 0x01;
        /// Also skip the type's fields
        const FIELD = 0x02;
        /// Also skip the type's properties
        const PROPERTY = 0x04;
        /// Also skip the type's events
        const EVENT = 0x08;
        /// Also exempt the type's method bodies from string hiding
        const STRING_HIDING = 0x10;
    }
}

/// A type-level rule: skips the type rename itself and, through `flags`, optionally its
/// members.
#[derive(Debug, Clone)]
pub struct TypeRule {
    /// Matched against the type's full name
    pub pattern: NamePattern,
    /// Member kinds this rule extends to
    pub flags: TypeSkipFlags,
    /// Optional visibility constraint on the type
    pub visibility: Option<Visibility>,
}

/// A member-level rule.
#[derive(Debug, Clone)]
pub struct MemberRule {
    /// Matched against the member name
    pub name: NamePattern,
    /// Matched against the declaring type's full name
    pub declaring: NamePattern,
    /// Optional visibility constraint on the member
    pub visibility: Option<Visibility>,
    /// Optional visibility constraint on the declaring type
    pub type_visibility: Option<Visibility>,
}

impl MemberRule {
    /// A rule matching a member name everywhere.
    #[must_use]
    pub fn named(name: NamePattern) -> Self {
        MemberRule {
            name,
            declaring: NamePattern::Any,
            visibility: None,
            type_visibility: None,
        }
    }

    fn matches(
        &self,
        name: &str,
        declaring_full_name: &str,
        is_public: bool,
        type_is_public: bool,
    ) -> bool {
        self.name.matches(name)
            && self.declaring.matches(declaring_full_name)
            && self.visibility.is_none_or(|v| v.admits(is_public))
            && self
                .type_visibility
                .is_none_or(|v| v.admits(type_is_public))
    }
}

/// The per-module rule collection.
#[derive(Debug, Default)]
pub struct SkipSet {
    namespaces: Vec<NamePattern>,
    types: Vec<TypeRule>,
    methods: Vec<MemberRule>,
    fields: Vec<MemberRule>,
    properties: Vec<MemberRule>,
    events: Vec<MemberRule>,
    string_hiding: Vec<MemberRule>,
    forced_methods: HashSet<MethodKey>,
}

impl SkipSet {
    /// Create an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        SkipSet::default()
    }

    /// Add a namespace rule: every symbol under a matching namespace is skipped.
    pub fn add_namespace(&mut self, pattern: NamePattern) {
        self.namespaces.push(pattern);
    }

    /// Add a type rule.
    pub fn add_type(&mut self, rule: TypeRule) {
        self.types.push(rule);
    }

    /// Add a method rule.
    pub fn add_method(&mut self, rule: MemberRule) {
        self.methods.push(rule);
    }

    /// Add a field rule.
    pub fn add_field(&mut self, rule: MemberRule) {
        self.fields.push(rule);
    }

    /// Add a property rule.
    pub fn add_property(&mut self, rule: MemberRule) {
        self.properties.push(rule);
    }

    /// Add an event rule.
    pub fn add_event(&mut self, rule: MemberRule) {
        self.events.push(rule);
    }

    /// Add a string-hiding exemption rule.
    pub fn add_string_hiding(&mut self, rule: MemberRule) {
        self.string_hiding.push(rule);
    }

    /// Force a specific method to be skipped (accessor coupling).
    pub fn force_skip_method(&mut self, key: MethodKey) {
        self.forced_methods.insert(key);
    }

    /// Whether the set holds no rules at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
            && self.types.is_empty()
            && self.methods.is_empty()
            && self.fields.is_empty()
            && self.properties.is_empty()
            && self.events.is_empty()
            && self.string_hiding.is_empty()
            && self.forced_methods.is_empty()
    }

    /// Whether a namespace is ruled out wholesale.
    #[must_use]
    pub fn should_skip_namespace(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|p| p.matches(namespace))
    }

    /// Whether the type itself is exempt from renaming.
    #[must_use]
    pub fn should_skip_type(&self, key: &TypeKey, type_is_public: bool) -> bool {
        if self.should_skip_namespace(&key.namespace) {
            return true;
        }
        self.types.iter().any(|rule| {
            rule.pattern.matches(&key.full_name())
                && rule.visibility.is_none_or(|v| v.admits(type_is_public))
        })
    }

    /// Whether a type-level rule with `flag` extends to this type's members.
    fn type_flag_match(&self, key: &TypeKey, flag: TypeSkipFlags, type_is_public: bool) -> bool {
        if self.should_skip_namespace(&key.namespace) {
            return true;
        }
        self.types.iter().any(|rule| {
            rule.flags.contains(flag)
                && rule.pattern.matches(&key.full_name())
                && rule.visibility.is_none_or(|v| v.admits(type_is_public))
        })
    }

    /// Whether a method is exempt from renaming.
    #[must_use]
    pub fn should_skip_method(
        &self,
        key: &MethodKey,
        is_public: bool,
        type_is_public: bool,
    ) -> bool {
        if self.forced_methods.contains(key) {
            return true;
        }
        if self.type_flag_match(&key.type_key, TypeSkipFlags::METHOD, type_is_public) {
            return true;
        }
        let declaring = key.type_key.full_name();
        self.methods
            .iter()
            .any(|r| r.matches(&key.name, &declaring, is_public, type_is_public))
    }

    /// Whether a method body is exempt from string hiding.
    #[must_use]
    pub fn should_skip_string_hiding(
        &self,
        key: &MethodKey,
        is_public: bool,
        type_is_public: bool,
    ) -> bool {
        if self.type_flag_match(&key.type_key, TypeSkipFlags::STRING_HIDING, type_is_public) {
            return true;
        }
        let declaring = key.type_key.full_name();
        self.string_hiding
            .iter()
            .any(|r| r.matches(&key.name, &declaring, is_public, type_is_public))
    }

    /// Whether a field is exempt from renaming.
    #[must_use]
    pub fn should_skip_field(&self, key: &FieldKey, is_public: bool, type_is_public: bool) -> bool {
        if self.type_flag_match(&key.type_key, TypeSkipFlags::FIELD, type_is_public) {
            return true;
        }
        let declaring = key.type_key.full_name();
        self.fields
            .iter()
            .any(|r| r.matches(&key.name, &declaring, is_public, type_is_public))
    }

    /// Whether a property is exempt from renaming.
    #[must_use]
    pub fn should_skip_property(
        &self,
        key: &PropertyKey,
        is_public: bool,
        type_is_public: bool,
    ) -> bool {
        if self.type_flag_match(&key.type_key, TypeSkipFlags::PROPERTY, type_is_public) {
            return true;
        }
        let declaring = key.type_key.full_name();
        self.properties
            .iter()
            .any(|r| r.matches(&key.name, &declaring, is_public, type_is_public))
    }

    /// Whether an event is exempt from renaming.
    #[must_use]
    pub fn should_skip_event(&self, key: &EventKey, is_public: bool, type_is_public: bool) -> bool {
        if self.type_flag_match(&key.type_key, TypeSkipFlags::EVENT, type_is_public) {
            return true;
        }
        let declaring = key.type_key.full_name();
        self.events
            .iter()
            .any(|r| r.matches(&key.name, &declaring, is_public, type_is_public))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParamSig;

    fn method_key(type_name: &str, name: &str) -> MethodKey {
        MethodKey::new(
            TypeKey::new("Lib", "Ns", type_name),
            name,
            ParamSig::new(&[], "System.Void"),
        )
    }

    #[test]
    fn test_literal_and_regex_patterns() {
        assert!(NamePattern::Literal("Run".to_string()).matches("Run"));
        assert!(!NamePattern::Literal("Run".to_string()).matches("RunAll"));

        let rx = NamePattern::regex("^get_").unwrap();
        assert!(rx.matches("get_Count"));
        assert!(!rx.matches("Count"));

        assert!(NamePattern::regex("(").is_err());
    }

    #[test]
    fn test_namespace_rule_covers_members() {
        let mut skip = SkipSet::new();
        skip.add_namespace(NamePattern::Literal("Ns".to_string()));

        assert!(skip.should_skip_type(&TypeKey::new("Lib", "Ns", "Widget"), false));
        assert!(skip.should_skip_method(&method_key("Widget", "Run"), false, false));
    }

    #[test]
    fn test_type_flags_extend_to_members() {
        let mut skip = SkipSet::new();
        skip.add_type(TypeRule {
            pattern: NamePattern::Literal("Ns.Widget".to_string()),
            flags: TypeSkipFlags::METHOD,
            visibility: None,
        });

        assert!(skip.should_skip_type(&TypeKey::new("Lib", "Ns", "Widget"), false));
        assert!(skip.should_skip_method(&method_key("Widget", "Run"), false, false));
        assert!(!skip.should_skip_field(
            &FieldKey::new(TypeKey::new("Lib", "Ns", "Widget"), "System.Int32", "x"),
            false,
            false
        ));
    }

    #[test]
    fn test_visibility_constraint() {
        let mut skip = SkipSet::new();
        let mut rule = MemberRule::named(NamePattern::Any);
        rule.visibility = Some(Visibility::Public);
        skip.add_method(rule);

        assert!(skip.should_skip_method(&method_key("Widget", "Run"), true, false));
        assert!(!skip.should_skip_method(&method_key("Widget", "Run"), false, false));
    }

    #[test]
    fn test_forced_skip() {
        let mut skip = SkipSet::new();
        let key = method_key("Widget", "get_Count");
        assert!(!skip.should_skip_method(&key, false, false));
        skip.force_skip_method(key.clone());
        assert!(skip.should_skip_method(&key, false, false));
    }
}
