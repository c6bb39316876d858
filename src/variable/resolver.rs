use crate::error::StepError;
use crate::http::request::{RequestBody, ResolvedRequest, insert_header};
use crate::loader::RequestTemplate;
use crate::variable::types::Scope;
use regex::{Captures, Regex};
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use std::time::Duration;

/// 所有请求共享的默认值（来自配置）
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    /// 相对路径的基础地址
    pub base_url: Option<String>,

    /// 默认请求头，模板中的同名 Header 优先
    pub headers: BTreeMap<String, String>,
}

/// 变量替换器
pub struct VariableResolver;

fn placeholder_regex() -> &'static Regex {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    VAR_REGEX
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").unwrap())
}

fn whole_placeholder_regex() -> &'static Regex {
    static WHOLE_REGEX: OnceLock<Regex> = OnceLock::new();
    WHOLE_REGEX
        .get_or_init(|| Regex::new(r"^\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}$").unwrap())
}

/// 把值渲染进文本：字符串原样，其它值使用紧凑 JSON
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 一次替换过程，记录所有未解析的占位符
struct Substitution<'a> {
    scope: Scope<'a>,
    missing: BTreeSet<String>,
}

impl<'a> Substitution<'a> {
    fn new(scope: Scope<'a>) -> Self {
        Self {
            scope,
            missing: BTreeSet::new(),
        }
    }

    fn text(&mut self, text: &str) -> String {
        placeholder_regex()
            .replace_all(text, |caps: &Captures| {
                let name = &caps[1];
                match self.scope.lookup(name) {
                    Some(value) => render(&value),
                    None => {
                        self.missing.insert(name.to_string());
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// JSON 值递归替换；只含一个占位符的字符串会被替换为原始类型的值
    fn value(&mut self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                if let Some(caps) = whole_placeholder_regex().captures(s) {
                    let name = &caps[1];
                    return match self.scope.lookup(name) {
                        Some(found) => found,
                        None => {
                            self.missing.insert(name.to_string());
                            value.clone()
                        }
                    };
                }
                Value::String(self.text(s))
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn map(&mut self, entries: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.clone(), self.text(v)))
            .collect()
    }

    fn finish(self) -> Result<(), StepError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(StepError::UnresolvedPlaceholder {
                names: self.missing.into_iter().collect(),
            })
        }
    }
}

impl VariableResolver {
    /// 替换文本中的所有 {{variable}} 占位符，任一未解析即失败
    pub fn substitute(text: &str, scope: Scope<'_>) -> Result<String, StepError> {
        let mut substitution = Substitution::new(scope);
        let output = substitution.text(text);
        substitution.finish()?;
        Ok(output)
    }

    /// 解析并替换系统环境变量 ${VAR}，未找到的保持原样
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }

    /// 把请求模板解析为完整请求
    ///
    /// path、headers、query、body 统一替换；只要有一个占位符无法解析，
    /// 整个请求失败，不会产生部分替换的请求。
    pub fn resolve_request(
        template: &RequestTemplate,
        scope: Scope<'_>,
        defaults: &RequestDefaults,
    ) -> Result<ResolvedRequest, StepError> {
        let mut substitution = Substitution::new(scope);

        let path = substitution.text(&template.path);

        let mut headers = substitution.map(&defaults.headers);
        for (name, value) in substitution.map(&template.headers) {
            insert_header(&mut headers, name, value);
        }

        let query = substitution.map(&template.query);

        let body = template.body.as_ref().map(|body| match body {
            RequestBody::Json(value) => RequestBody::Json(substitution.value(value)),
            RequestBody::Form(fields) => RequestBody::Form(substitution.map(fields)),
            RequestBody::Text(text) => RequestBody::Text(substitution.text(text)),
        });

        substitution.finish()?;

        let url = join_url(defaults.base_url.as_deref(), &path)?;
        validate_headers(&headers)?;

        Ok(ResolvedRequest {
            method: template.method,
            url,
            headers,
            query,
            body,
            auth: template.auth,
            timeout: template.timeout_ms.map(Duration::from_millis),
        })
    }
}

/// 拼接基础地址和路径；路径本身是绝对 URL 时直接使用
fn join_url(base_url: Option<&str>, path: &str) -> Result<String, StepError> {
    let path = path.trim();
    let full = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        let base = base_url.map(str::trim).filter(|b| !b.is_empty()).ok_or_else(|| {
            StepError::InvalidRequest(format!(
                "relative path '{}' requires a base_url",
                path
            ))
        })?;
        let cleaned_base = base.trim_end_matches('/');
        let cleaned_path = path.trim_start_matches('/');
        if cleaned_path.is_empty() {
            cleaned_base.to_string()
        } else {
            format!("{}/{}", cleaned_base, cleaned_path)
        }
    };

    url::Url::parse(&full)
        .map_err(|e| StepError::InvalidRequest(format!("invalid URL '{}': {}", full, e)))?;
    Ok(full)
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), StepError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| StepError::InvalidRequest(format!("invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            StepError::InvalidRequest(format!("invalid value for header '{}'", name))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Method;
    use crate::variable::types::{Constants, ExecutionContext};
    use serde_json::json;

    fn defaults() -> RequestDefaults {
        RequestDefaults {
            base_url: Some("http://localhost:8080/".to_string()),
            headers: BTreeMap::from([("X-Client".to_string(), "caserun".to_string())]),
        }
    }

    #[test]
    fn test_substitute_simple() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("uid", 7);
        let constants = Constants::new();

        let output = VariableResolver::substitute("/users/{{uid}}", Scope::new(&ctx, &constants));
        assert_eq!(output.unwrap(), "/users/7");
    }

    #[test]
    fn test_substitute_missing_variable() {
        let ctx = ExecutionContext::new();
        let constants = Constants::new();

        let err = VariableResolver::substitute("{{missing}}/path", Scope::new(&ctx, &constants))
            .unwrap_err();
        assert_eq!(
            err,
            StepError::UnresolvedPlaceholder {
                names: vec!["missing".to_string()]
            }
        );
    }

    #[test]
    fn test_resolve_request_all_fields() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("uid", 42);
        ctx.insert("token", "t-1");
        let mut constants = Constants::new();
        constants.insert("tenant", "acme");

        let template = RequestTemplate::new(Method::Post, "/tenants/{{tenant}}/users/{{uid}}")
            .with_header("X-Token", "{{token}}")
            .with_query("expand", "{{tenant}}")
            .with_json(json!({"id": "{{uid}}", "label": "user-{{uid}}", "tags": ["{{tenant}}"]}));

        let request =
            VariableResolver::resolve_request(&template, Scope::new(&ctx, &constants), &defaults())
                .unwrap();

        assert_eq!(request.url, "http://localhost:8080/tenants/acme/users/42");
        assert_eq!(request.headers.get("X-Token").unwrap(), "t-1");
        assert_eq!(request.headers.get("X-Client").unwrap(), "caserun");
        assert_eq!(request.query.get("expand").unwrap(), "acme");
        assert_eq!(
            request.body,
            Some(RequestBody::Json(
                json!({"id": 42, "label": "user-42", "tags": ["acme"]})
            ))
        );
    }

    #[test]
    fn test_template_header_overrides_default_ignoring_case() {
        let ctx = ExecutionContext::new();
        let constants = Constants::new();
        let defaults = RequestDefaults {
            base_url: Some("http://localhost:8080".to_string()),
            headers: BTreeMap::from([("x-client".to_string(), "default".to_string())]),
        };

        let template = RequestTemplate::new(Method::Get, "/ping").with_header("X-Client", "custom");
        let request =
            VariableResolver::resolve_request(&template, Scope::new(&ctx, &constants), &defaults)
                .unwrap();

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers.get("X-Client").unwrap(), "custom");
    }

    #[test]
    fn test_resolve_request_is_all_or_nothing() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("uid", 1);
        let constants = Constants::new();

        let template = RequestTemplate::new(Method::Get, "/users/{{uid}}")
            .with_header("Authorization", "{{session}}")
            .with_json(json!({"order": "{{order_id}}"}));

        let err =
            VariableResolver::resolve_request(&template, Scope::new(&ctx, &constants), &defaults())
                .unwrap_err();
        assert_eq!(
            err,
            StepError::UnresolvedPlaceholder {
                names: vec!["order_id".to_string(), "session".to_string()]
            }
        );
    }

    #[test]
    fn test_template_header_overrides_default() {
        let ctx = ExecutionContext::new();
        let constants = Constants::new();
        let template = RequestTemplate::new(Method::Get, "/ping").with_header("X-Client", "custom");

        let request =
            VariableResolver::resolve_request(&template, Scope::new(&ctx, &constants), &defaults())
                .unwrap();
        assert_eq!(request.headers.get("X-Client").unwrap(), "custom");
    }

    #[test]
    fn test_absolute_path_ignores_base_url() {
        let ctx = ExecutionContext::new();
        let mut constants = Constants::new();
        constants.insert("base_url", "https://api.example.com");
        let template = RequestTemplate::new(Method::Get, "{{base_url}}/v1/ping");

        let request = VariableResolver::resolve_request(
            &template,
            Scope::new(&ctx, &constants),
            &RequestDefaults::default(),
        )
        .unwrap();
        assert_eq!(request.url, "https://api.example.com/v1/ping");
    }

    #[test]
    fn test_relative_path_without_base_url_fails() {
        let ctx = ExecutionContext::new();
        let constants = Constants::new();
        let template = RequestTemplate::new(Method::Get, "/ping");

        let err = VariableResolver::resolve_request(
            &template,
            Scope::new(&ctx, &constants),
            &RequestDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StepError::InvalidRequest(_)));
    }

    #[test]
    fn test_resolve_env_vars_missing() {
        let input = "Value: ${CASERUN_SURELY_UNSET_VAR}";
        let output = VariableResolver::resolve_env_vars(input);
        assert_eq!(output, "Value: ${CASERUN_SURELY_UNSET_VAR}");
    }
}
