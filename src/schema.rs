//! Structural schema for staged documents.
//!
//! A schema is an ordered list of rules. Each rule names a path pattern
//! (segments may be `*`), the kind of node expected there, and the keys a
//! map node must carry. Rules only constrain nodes that exist; absence is
//! never a violation. Validation collects every violation instead of
//! stopping at the first.

use crate::document::{ConfigNode, ConfigPath, NodeKind, Scalar};
use crate::error::{PathError, SchemaViolation, ValidationError};

/// Expected node shape for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindRule {
    Any,
    Exactly(NodeKind),
}

impl KindRule {
    /// Parse the `kind` field of a settings rule.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "any" => Some(Self::Any),
            "map" => Some(Self::Exactly(NodeKind::Map)),
            "list" => Some(Self::Exactly(NodeKind::List)),
            "scalar" => Some(Self::Exactly(NodeKind::Scalar)),
            _ => None,
        }
    }

    fn accepts(&self, kind: NodeKind) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(expected) => *expected == kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRule {
    pattern: Vec<String>,
    kind: KindRule,
    required: Vec<String>,
}

impl SchemaRule {
    /// Build a rule from a pattern such as `gateways/gateway_group/*`.
    pub fn new(pattern: &str, kind: KindRule, required: &[&str]) -> Result<Self, PathError> {
        let path = ConfigPath::parse(pattern)?;
        if path.is_append() {
            return Err(PathError::AppendNotAllowed {
                path: pattern.to_string(),
            });
        }
        Ok(Self {
            pattern: path.segments().to_vec(),
            kind,
            required: required.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Rule from a pattern known to be well formed.
    fn fixed(pattern: &str, kind: KindRule, required: &[&str]) -> Self {
        Self {
            pattern: pattern.split('/').map(str::to_string).collect(),
            kind,
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn pattern(&self) -> String {
        self.pattern.join("/")
    }

    fn check(&self, root: &ConfigNode, violations: &mut Vec<SchemaViolation>) {
        let mut matches = Vec::new();
        collect_matches(root, &self.pattern, &mut Vec::new(), &mut matches);

        for (path, node) in matches {
            if !self.kind.accepts(node.kind()) {
                let expected = match self.kind {
                    KindRule::Exactly(kind) => kind.as_str(),
                    KindRule::Any => "any",
                };
                violations.push(SchemaViolation {
                    path,
                    message: format!("expected {}, found {}", expected, node.kind().as_str()),
                });
                continue;
            }
            if let ConfigNode::Map(map) = node {
                for key in &self.required {
                    if !map.contains_key(key) {
                        violations.push(SchemaViolation {
                            path: path.clone(),
                            message: format!("missing required key '{}'", key),
                        });
                    }
                }
            }
        }
    }
}

/// Walk `node` along `pattern`, collecting every concrete match.
fn collect_matches<'a>(
    node: &'a ConfigNode,
    pattern: &[String],
    trail: &mut Vec<String>,
    out: &mut Vec<(String, &'a ConfigNode)>,
) {
    let Some((head, rest)) = pattern.split_first() else {
        out.push((trail.join("/"), node));
        return;
    };

    let mut visit = |key: String, child: &'a ConfigNode, trail: &mut Vec<String>| {
        trail.push(key);
        collect_matches(child, rest, trail, out);
        trail.pop();
    };

    match node {
        ConfigNode::Map(map) if head == "*" => {
            for (key, child) in map.iter() {
                visit(key.to_string(), child, trail);
            }
        }
        ConfigNode::Map(map) => {
            if let Some(child) = map.get(head) {
                visit(head.clone(), child, trail);
            }
        }
        ConfigNode::List(items) if head == "*" => {
            for (index, child) in items.iter().enumerate() {
                visit(index.to_string(), child, trail);
            }
        }
        ConfigNode::List(items) => {
            if let Some(child) = head.parse::<usize>().ok().and_then(|i| items.get(i)) {
                visit(head.clone(), child, trail);
            }
        }
        ConfigNode::Scalar(_) => {}
    }
}

/// Ordered set of rules applied before every commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    rules: Vec<SchemaRule>,
}

impl Schema {
    /// A schema with no rules. Only the intrinsic checks apply.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for the subtrees the administrative pages depend on.
    pub fn builtin() -> Self {
        let map = KindRule::Exactly(NodeKind::Map);
        let list = KindRule::Exactly(NodeKind::List);
        let table: &[(&str, KindRule, &[&str])] = &[
            ("system", map, &[]),
            ("system/acb", map, &[]),
            ("gateways", map, &[]),
            ("gateways/gateway_item", list, &[]),
            ("gateways/gateway_item/*", map, &["name", "interface"]),
            ("gateways/gateway_group", list, &[]),
            ("gateways/gateway_group/*", map, &["name", "item"]),
            ("openvpn", map, &[]),
            ("openvpn/openvpn-server", list, &[]),
            ("openvpn/openvpn-server/*", map, &["vpnid", "mode", "protocol"]),
            ("crl", list, &[]),
            ("ca", list, &[]),
            ("cert", list, &[]),
            ("filter/rule", list, &[]),
        ];

        let rules = table
            .iter()
            .map(|(pattern, kind, required)| SchemaRule::fixed(pattern, *kind, required))
            .collect();
        Self { rules }
    }

    pub fn push(&mut self, rule: SchemaRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[SchemaRule] {
        &self.rules
    }

    /// Check a whole document.
    ///
    /// Intrinsic checks: the root must be a map and floats must be finite.
    pub fn validate(&self, root: &ConfigNode) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if root.kind() != NodeKind::Map {
            violations.push(SchemaViolation {
                path: String::new(),
                message: format!("document root must be a map, found {}", root.kind().as_str()),
            });
        }
        check_floats(root, &mut Vec::new(), &mut violations);

        for rule in &self.rules {
            rule.check(root, &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

fn check_floats(node: &ConfigNode, trail: &mut Vec<String>, out: &mut Vec<SchemaViolation>) {
    match node {
        ConfigNode::Scalar(Scalar::Float(f)) if !f.is_finite() => out.push(SchemaViolation {
            path: trail.join("/"),
            message: format!("non-finite number {}", f),
        }),
        ConfigNode::Scalar(_) => {}
        ConfigNode::List(items) => {
            for (index, item) in items.iter().enumerate() {
                trail.push(index.to_string());
                check_floats(item, trail, out);
                trail.pop();
            }
        }
        ConfigNode::Map(map) => {
            for (key, value) in map.iter() {
                trail.push(key.to_string());
                check_floats(value, trail, out);
                trail.pop();
            }
        }
    }
}
