//! URL rules and the map that matches request paths against them.
//!
//! A rule like `/wish/<to>` or `/post/<int:id>` is compiled into a regular
//! expression once, when it is registered. Rules without placeholders are
//! matched by plain string comparison and always take precedence over
//! dynamic rules.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::LazyLock,
};

use miroslava_http_models::Method;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:([A-Za-z_][A-Za-z0-9_]*):)?([A-Za-z_][A-Za-z0-9_]*)>").expect("Invalid Regex")
});

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Variable '{name}' appears more than once in rule '{rule}'")]
    DuplicateVariable { rule: String, name: String },
    #[error("Invalid rule '{rule}': {source}")]
    InvalidRule {
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error("Could not build url for endpoint '{0}'")]
    UnknownEndpoint(String),
    #[error("Could not build url for endpoint '{endpoint}'. Did you forget to specify values {missing:?}?")]
    MissingValues {
        endpoint: String,
        missing: Vec<String>,
    },
}

/// A converted URL variable, or a rule default.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum UrlValue {
    Int(i64),
    Str(String),
}

impl UrlValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(x) => Some(x),
            Self::Int(_) => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(x) => Some(*x),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for UrlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{x}"),
            Self::Str(x) => f.write_str(x),
        }
    }
}

impl From<i64> for UrlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for UrlValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for UrlValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for UrlValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

pub type UrlValues = BTreeMap<String, UrlValue>;

/// Options accepted when registering a rule.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub endpoint: Option<String>,
    pub methods: Option<Vec<Method>>,
    pub defaults: UrlValues,
    pub provide_automatic_options: Option<bool>,
}

impl RouteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    #[must_use]
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<UrlValue>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub const fn provide_automatic_options(mut self, value: bool) -> Self {
        self.provide_automatic_options = Some(value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Converter {
    Int,
    Str,
}

impl Converter {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("int") => Self::Int,
            Some(other) => {
                log::debug!("Unknown converter '{other}', treating the value as a string");
                Self::Str
            }
            None => Self::Str,
        }
    }

    const fn pattern(self) -> &'static str {
        match self {
            Self::Int => r"\d+",
            Self::Str => "[^/]+",
        }
    }

    fn convert(self, value: &str) -> Option<UrlValue> {
        match self {
            Self::Int => value.parse::<i64>().ok().map(UrlValue::Int),
            Self::Str => Some(UrlValue::Str(value.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
enum RulePart {
    Literal(String),
    Variable { name: String, converter: Converter },
}

#[derive(Debug, Clone)]
pub struct Rule {
    rule: String,
    endpoint: String,
    methods: BTreeSet<Method>,
    defaults: UrlValues,
    provide_automatic_options: bool,
    parts: Vec<RulePart>,
    pattern: Option<Regex>,
}

impl Rule {
    /// Compile a rule string.
    ///
    /// # Errors
    ///
    /// * If the same variable name is used twice
    /// * If the compiled pattern is not a valid regular expression
    pub fn new(rule: &str, options: RouteOptions) -> Result<Self, RoutingError> {
        let RouteOptions {
            endpoint,
            methods,
            defaults,
            provide_automatic_options,
        } = options;

        let mut methods: BTreeSet<Method> = methods
            .unwrap_or_else(|| vec![Method::Get])
            .into_iter()
            .collect();
        if methods.contains(&Method::Get) {
            methods.insert(Method::Head);
        }
        let provide_automatic_options =
            provide_automatic_options.unwrap_or_else(|| !methods.contains(&Method::Options));

        let parts = parse_parts(rule)?;
        let pattern = if parts
            .iter()
            .any(|x| matches!(x, RulePart::Variable { .. }))
        {
            let mut source = String::from("^");
            for part in &parts {
                match part {
                    RulePart::Literal(literal) => source.push_str(&regex::escape(literal)),
                    RulePart::Variable { name, converter } => {
                        source.push_str(&format!("(?P<{name}>{})", converter.pattern()));
                    }
                }
            }
            source.push('$');
            Some(Regex::new(&source).map_err(|e| RoutingError::InvalidRule {
                rule: rule.to_string(),
                source: e,
            })?)
        } else {
            None
        };

        Ok(Self {
            rule: rule.to_string(),
            endpoint: endpoint.unwrap_or_else(|| rule.to_string()),
            methods,
            defaults,
            provide_automatic_options,
            parts,
            pattern,
        })
    }

    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub const fn methods(&self) -> &BTreeSet<Method> {
        &self.methods
    }

    #[must_use]
    pub const fn defaults(&self) -> &UrlValues {
        &self.defaults
    }

    #[must_use]
    pub const fn provide_automatic_options(&self) -> bool {
        self.provide_automatic_options
    }

    /// Whether the rule contains placeholders.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.pattern.is_some()
    }

    /// Names of the placeholders, in rule order.
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|x| match x {
            RulePart::Variable { name, .. } => Some(name.as_str()),
            RulePart::Literal(_) => None,
        })
    }

    /// `None` when the path doesn't match, `Some(None)` when it matches but a
    /// value fails to convert.
    fn match_path(&self, path: &str) -> Option<Option<UrlValues>> {
        let Some(pattern) = &self.pattern else {
            return (self.rule == path).then(|| Some(self.defaults.clone()));
        };

        let captures = pattern.captures(path)?;
        let mut values = self.defaults.clone();

        for part in &self.parts {
            if let RulePart::Variable { name, converter } = part {
                let raw = captures.name(name).map_or("", |x| x.as_str());
                let Some(value) = converter.convert(raw) else {
                    log::debug!("Failed to convert '{raw}' for variable '{name}' of '{}'", self.rule);
                    return Some(None);
                };
                values.insert(name.clone(), value);
            }
        }

        Some(Some(values))
    }

    fn build(&self, values: &UrlValues) -> Option<String> {
        for (key, default) in &self.defaults {
            if values.get(key).is_some_and(|x| x != default) {
                return None;
            }
        }

        let mut path = String::new();
        for part in &self.parts {
            match part {
                RulePart::Literal(literal) => path.push_str(literal),
                RulePart::Variable { name, .. } => {
                    let value = values.get(name)?;
                    path.push_str(&urlencoding::encode(&value.to_string()));
                }
            }
        }

        let query = values
            .iter()
            .filter(|(key, _)| {
                !self.defaults.contains_key(*key) && !self.arguments().any(|x| x == key.as_str())
            })
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(&value.to_string())
                )
            })
            .collect::<Vec<_>>();

        if !query.is_empty() {
            path.push('?');
            path.push_str(&query.join("&"));
        }

        Some(path)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = self
            .methods
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join(", ");
        write!(f, "<Rule '{}' ({methods}) -> {}>", self.rule, self.endpoint)
    }
}

fn parse_parts(rule: &str) -> Result<Vec<RulePart>, RoutingError> {
    let mut parts = vec![];
    let mut seen = BTreeSet::new();
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(rule) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        if whole.start() > last {
            parts.push(RulePart::Literal(rule[last..whole.start()].to_string()));
        }
        let name = name.as_str().to_string();
        if !seen.insert(name.clone()) {
            return Err(RoutingError::DuplicateVariable {
                rule: rule.to_string(),
                name,
            });
        }
        let converter = Converter::from_name(captures.get(1).map(|x| x.as_str()));
        parts.push(RulePart::Variable { name, converter });
        last = whole.end();
    }

    if last < rule.len() {
        parts.push(RulePart::Literal(rule[last..].to_string()));
    }

    Ok(parts)
}

/// Outcome of matching a request against the [`Map`].
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Found { rule: &'a Rule, values: UrlValues },
    /// The path is known and the request is an automatic `OPTIONS` request.
    Options { allowed: BTreeSet<Method> },
    MethodNotAllowed { allowed: BTreeSet<Method> },
    NotFound,
}

/// Registered rules in registration order.
#[derive(Debug, Clone, Default)]
pub struct Map {
    rules: Vec<Rule>,
}

impl Map {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: Rule) {
        log::debug!("Adding url rule {rule}");
        self.rules.push(rule);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the rule serving `method` on `path`.
    ///
    /// Static rules are checked before dynamic ones. The first rule matching
    /// both the path and the method wins. A path that matches a rule but
    /// fails its converters is not found, even if a later rule would match.
    #[must_use]
    pub fn match_path(&self, path: &str, method: Method) -> RouteMatch<'_> {
        let ordered = self
            .rules
            .iter()
            .filter(|x| !x.is_dynamic())
            .chain(self.rules.iter().filter(|x| x.is_dynamic()));

        let mut path_matched = false;
        let mut automatic_options = false;
        let mut allowed = BTreeSet::new();

        for rule in ordered {
            let values = match rule.match_path(path) {
                Some(Some(values)) => values,
                Some(None) => return RouteMatch::NotFound,
                None => continue,
            };
            if rule.methods.contains(&method) {
                return RouteMatch::Found { rule, values };
            }
            path_matched = true;
            automatic_options |= rule.provide_automatic_options;
            allowed.extend(rule.methods.iter().copied());
        }

        if !path_matched {
            return RouteMatch::NotFound;
        }

        if automatic_options {
            allowed.insert(Method::Options);
            if method == Method::Options {
                return RouteMatch::Options { allowed };
            }
        }

        RouteMatch::MethodNotAllowed { allowed }
    }

    /// Build the path for `endpoint`.
    ///
    /// Uses the first rule of the endpoint that every value fits. Values that
    /// are not rule variables end up in the query string.
    ///
    /// # Errors
    ///
    /// * If no rule is registered for the endpoint
    /// * If no rule of the endpoint can be built from the values
    pub fn build(&self, endpoint: &str, values: &UrlValues) -> Result<String, RoutingError> {
        let mut candidates = self.rules.iter().filter(|x| x.endpoint == endpoint).peekable();

        if candidates.peek().is_none() {
            return Err(RoutingError::UnknownEndpoint(endpoint.to_string()));
        }

        let mut missing = BTreeSet::new();
        for rule in candidates {
            if let Some(path) = rule.build(values) {
                return Ok(path);
            }
            missing.extend(
                rule.arguments()
                    .filter(|x| !values.contains_key(*x))
                    .map(ToString::to_string),
            );
        }

        Err(RoutingError::MissingValues {
            endpoint: endpoint.to_string(),
            missing: missing.into_iter().collect(),
        })
    }
}

/// Format a method set for the `Allow` header.
#[must_use]
pub fn allow_header(methods: &BTreeSet<Method>) -> String {
    methods
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(", ")
}
