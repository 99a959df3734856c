//! Route-level access decisions.
//!
//! An ordered rule table maps `(principal, method, path)` to allow/deny. The
//! first matching rule wins; anything the table cannot classify is denied.

use std::str::FromStr;
use std::sync::OnceLock;

use serde::Serialize;
use thiserror::Error;

use crate::authority::{Authority, ROLE_ADMIN, ROLE_USER};
use crate::principal::Principal;

// ─────────────────────────────────────────────────────────────────────────────
// Methods
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Method tokens are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            "CONNECT" => Ok(HttpMethod::Connect),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

impl core::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decisions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Authentication required and no (enabled) principal present.
    Unauthenticated,
    /// Principal present but lacks every authority the rule accepts.
    Forbidden,
    /// The path is malformed or ambiguous.
    Rejected,
    /// No rule matched.
    NoMatchingRule,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

/// What a matching rule demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    AnyOf(Vec<Authority>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatch {
    Any,
    Only(Vec<HttpMethod>),
}

impl MethodMatch {
    fn matches(&self, method: HttpMethod) -> bool {
        match self {
            MethodMatch::Any => true,
            MethodMatch::Only(methods) => methods.contains(&method),
        }
    }
}

/// Ant-style path pattern.
///
/// `/admin/**` matches `/admin` and everything below it, `/**` matches every
/// path, anything else matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Everything,
    Subtree(String),
    Exact(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "/**" {
            return PathPattern::Everything;
        }
        match pattern.strip_suffix("/**") {
            Some(base) => PathPattern::Subtree(base.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Everything => true,
            PathPattern::Subtree(base) => {
                path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            PathPattern::Exact(exact) => path == exact,
        }
    }
}

impl core::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PathPattern::Everything => f.write_str("/**"),
            PathPattern::Subtree(base) => write!(f, "{base}/**"),
            PathPattern::Exact(exact) => f.write_str(exact),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    name: &'static str,
    patterns: Vec<PathPattern>,
    methods: MethodMatch,
    access: Access,
}

impl RouteRule {
    pub fn new(name: &'static str, patterns: &[&str], access: Access) -> Self {
        Self {
            name,
            patterns: patterns.iter().map(|p| PathPattern::parse(p)).collect(),
            methods: MethodMatch::Any,
            access,
        }
    }

    pub fn methods(mut self, methods: &[HttpMethod]) -> Self {
        self.methods = MethodMatch::Only(methods.to_vec());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    fn matches(&self, method: HttpMethod, path: &str) -> bool {
        self.methods.matches(method) && self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Static assets served without authentication.
pub const STATIC_ASSET_PATTERNS: &[&str] = &["/css/**", "/js/**", "/images/**", "/webjars/**", "/favicon.ico"];

/// Ordered rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// The application's rule table, built once.
    pub fn standard() -> &'static RouteTable {
        static TABLE: OnceLock<RouteTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            RouteTable::new(vec![
                RouteRule::new("admin", &["/admin/**", "/api/admin/**"], Access::AnyOf(vec![ROLE_ADMIN])),
                RouteRule::new(
                    "user",
                    &["/user/**", "/api/users/**"],
                    Access::AnyOf(vec![ROLE_USER, ROLE_ADMIN]),
                ),
                RouteRule::new("login", &["/login", "/logout", "/api/login", "/error", "/health"], Access::Public),
                RouteRule::new("static", STATIC_ASSET_PATTERNS, Access::Public),
                RouteRule::new("authenticated", &["/**"], Access::Authenticated),
            ])
        })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn decide(&self, principal: Option<&Principal>, method: HttpMethod, path: &str) -> Decision {
        self.evaluate(principal, method, path).0
    }

    /// Explain the decision for audit/debugging.
    pub fn explain(
        &self,
        principal: Option<&Principal>,
        method: HttpMethod,
        path: &str,
    ) -> DecisionExplanation {
        let (decision, rule) = self.evaluate(principal, method, path);
        let active = principal.filter(|p| p.is_enabled());

        DecisionExplanation {
            method,
            path: path.to_string(),
            matched_rule: rule.map(|r| r.name.to_string()),
            required_authorities: match rule.map(|r| &r.access) {
                Some(Access::AnyOf(wanted)) => wanted.iter().map(|a| a.as_str().to_string()).collect(),
                _ => Vec::new(),
            },
            authentication_required: matches!(
                rule.map(|r| &r.access),
                Some(Access::Authenticated) | Some(Access::AnyOf(_))
            ),
            principal: principal.map(|p| p.identifier().to_string()),
            principal_enabled: principal.map(|p| p.is_enabled()),
            authorities: active
                .map(|p| p.authorities().iter().map(|a| a.as_str().to_string()).collect())
                .unwrap_or_default(),
            decision,
        }
    }

    fn evaluate(
        &self,
        principal: Option<&Principal>,
        method: HttpMethod,
        path: &str,
    ) -> (Decision, Option<&RouteRule>) {
        if !is_well_formed(path) {
            return (Decision::Deny(DenyReason::Rejected), None);
        }

        // A disabled account carries no authority at all.
        let principal = principal.filter(|p| p.is_enabled());

        let Some(rule) = self.rules.iter().find(|r| r.matches(method, path)) else {
            return (Decision::Deny(DenyReason::NoMatchingRule), None);
        };

        let decision = match (&rule.access, principal) {
            (Access::Public, _) => Decision::Allow,
            (_, None) => Decision::Deny(DenyReason::Unauthenticated),
            (Access::Authenticated, Some(_)) => Decision::Allow,
            (Access::AnyOf(wanted), Some(p)) if p.has_any_authority(wanted) => Decision::Allow,
            (Access::AnyOf(_), Some(_)) => Decision::Deny(DenyReason::Forbidden),
        };
        (decision, Some(rule))
    }
}

/// Decide against the standard table.
pub fn decide(principal: Option<&Principal>, method: HttpMethod, path: &str) -> Decision {
    RouteTable::standard().decide(principal, method, path)
}

/// Explain against the standard table.
pub fn explain(principal: Option<&Principal>, method: HttpMethod, path: &str) -> DecisionExplanation {
    RouteTable::standard().explain(principal, method, path)
}

/// Paths a strict request firewall would refuse.
///
/// Anything that could be read two ways by the router and the rule table
/// (dot segments, empty segments, encoded separators) is rejected outright.
fn is_well_formed(path: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    if path.contains("//") || path.contains(';') || path.contains('\\') {
        return false;
    }
    if path.chars().any(char::is_control) {
        return false;
    }
    let lower = path.to_ascii_lowercase();
    if ["%2e", "%2f", "%5c", "%25", "%00"].iter().any(|enc| lower.contains(enc)) {
        return false;
    }
    !path.split('/').any(|segment| segment == "." || segment == "..")
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request was allowed or denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionExplanation {
    pub method: HttpMethod,
    pub path: String,
    pub matched_rule: Option<String>,
    pub required_authorities: Vec<String>,
    pub authentication_required: bool,
    pub principal: Option<String>,
    pub principal_enabled: Option<bool>,
    /// Authorities that counted (empty for a disabled principal).
    pub authorities: Vec<String>,
    pub decision: Decision,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{build, fixtures};
    use proptest::prelude::*;

    const GET: HttpMethod = HttpMethod::Get;

    #[test]
    fn admin_routes_need_admin() {
        let user = fixtures::principal(&["USER"]);
        let admin = fixtures::principal(&["ADMIN"]);

        for path in ["/admin", "/admin/x", "/api/admin/users/3"] {
            assert_eq!(decide(Some(&user), GET, path), Decision::Deny(DenyReason::Forbidden));
            assert_eq!(decide(Some(&admin), GET, path), Decision::Allow);
            assert_eq!(decide(None, GET, path), Decision::Deny(DenyReason::Unauthenticated));
        }
    }

    #[test]
    fn user_routes_accept_user_or_admin() {
        let user = fixtures::principal(&["USER"]);
        let admin = fixtures::principal(&["ADMIN"]);
        let guest = fixtures::principal(&["GUEST"]);

        for path in ["/user", "/user/profile", "/api/users/current"] {
            assert!(decide(Some(&user), GET, path).is_allowed());
            assert!(decide(Some(&admin), HttpMethod::Post, path).is_allowed());
            assert_eq!(decide(Some(&guest), GET, path), Decision::Deny(DenyReason::Forbidden));
        }
    }

    #[test]
    fn login_and_static_assets_are_public() {
        for path in ["/login", "/css/site.css", "/js/api.js", "/favicon.ico", "/health"] {
            assert_eq!(decide(None, GET, path), Decision::Allow, "{path}");
        }
        assert_eq!(decide(None, HttpMethod::Post, "/login"), Decision::Allow);
    }

    #[test]
    fn everything_else_requires_any_principal() {
        let roleless = fixtures::principal(&[]);
        assert_eq!(decide(None, GET, "/"), Decision::Deny(DenyReason::Unauthenticated));
        assert_eq!(decide(Some(&roleless), GET, "/"), Decision::Allow);
        assert_eq!(decide(Some(&roleless), GET, "/whoami"), Decision::Allow);
        assert_eq!(
            decide(Some(&roleless), GET, "/admin"),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn subtree_patterns_respect_segment_boundaries() {
        let user = fixtures::principal(&["USER"]);
        // "/administrator" is not under "/admin".
        assert_eq!(decide(Some(&user), GET, "/administrator"), Decision::Allow);
        assert_eq!(decide(None, GET, "/login/extra"), Decision::Deny(DenyReason::Unauthenticated));
    }

    #[test]
    fn disabled_principal_counts_as_absent() {
        let disabled = build(&fixtures::user("gone@example.com", &["ADMIN"], false));
        assert_eq!(
            decide(Some(&disabled), GET, "/admin"),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(decide(Some(&disabled), GET, "/login"), Decision::Allow);
    }

    #[test]
    fn ambiguous_paths_are_rejected() {
        let admin = fixtures::principal(&["ADMIN"]);
        for path in [
            "admin",
            "/user/../admin",
            "/user/./x",
            "//admin",
            "/user;jsessionid=1",
            "/user/%2e%2e/admin",
            "/user%2Fadmin",
            "/a\\b",
            "/a\nb",
        ] {
            assert_eq!(
                decide(Some(&admin), GET, path),
                Decision::Deny(DenyReason::Rejected),
                "{path:?}"
            );
        }
    }

    #[test]
    fn first_match_wins_and_unmatched_is_denied() {
        let user = fixtures::principal(&["USER"]);
        let table = RouteTable::new(vec![
            RouteRule::new("open-reports", &["/reports/**"], Access::Public).methods(&[HttpMethod::Get]),
            RouteRule::new("reports", &["/reports/**"], Access::AnyOf(vec![ROLE_ADMIN])),
        ]);
        assert_eq!(table.decide(None, GET, "/reports/q3"), Decision::Allow);
        assert_eq!(
            table.decide(Some(&user), HttpMethod::Post, "/reports/q3"),
            Decision::Deny(DenyReason::Forbidden)
        );
        assert_eq!(
            table.decide(Some(&user), GET, "/elsewhere"),
            Decision::Deny(DenyReason::NoMatchingRule)
        );
    }

    #[test]
    fn explanation_names_rule_and_requirements() {
        let user = fixtures::principal(&["USER"]);
        let explanation = explain(Some(&user), GET, "/admin/users");
        assert_eq!(explanation.matched_rule.as_deref(), Some("admin"));
        assert_eq!(explanation.required_authorities, vec!["ROLE_ADMIN".to_string()]);
        assert_eq!(explanation.authorities, vec!["ROLE_USER".to_string()]);
        assert_eq!(explanation.decision, Decision::Deny(DenyReason::Forbidden));

        let json = serde_json::to_value(&explanation).unwrap();
        assert_eq!(json["decision"]["decision"], "deny");
        assert_eq!(json["decision"]["reason"], "forbidden");
        assert_eq!(json["method"], "GET");
    }

    #[test]
    fn method_tokens_parse_case_sensitively() {
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("get".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    fn any_method() -> impl Strategy<Value = HttpMethod> {
        prop_oneof![
            Just(HttpMethod::Get),
            Just(HttpMethod::Post),
            Just(HttpMethod::Put),
            Just(HttpMethod::Delete),
            Just(HttpMethod::Patch),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the same inputs always give the same decision.
        #[test]
        fn decisions_are_deterministic(
            method in any_method(),
            path in "(/[a-z.%;]{0,6}){1,4}",
            roles in prop::sample::subsequence(vec!["ADMIN", "USER", "GUEST"], 0..=3),
        ) {
            let principal = fixtures::principal(&roles);
            let first = decide(Some(&principal), method, &path);
            prop_assert_eq!(first, decide(Some(&principal), method, &path));
            prop_assert_eq!(decide(None, method, &path), decide(None, method, &path));
        }

        /// Property: ROLE_USER alone never reaches the admin subtree; ROLE_ADMIN always does.
        #[test]
        fn admin_subtree_is_admin_only(
            method in any_method(),
            tail in "(/[a-z0-9]{1,8}){0,3}",
        ) {
            let path = format!("/admin{tail}");
            let user = fixtures::principal(&["USER"]);
            let admin = fixtures::principal(&["ADMIN"]);
            prop_assert_eq!(decide(Some(&user), method, &path), Decision::Deny(DenyReason::Forbidden));
            prop_assert_eq!(decide(Some(&admin), method, &path), Decision::Allow);
        }
    }
}
