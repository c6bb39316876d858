use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::assertion::Expectation;
use crate::http::{Method, RequestBody};
use crate::variable::VariableCapture;
use crate::variable::capture::deserialize_captures;

fn default_true() -> bool {
    true
}

/// 请求模板，各字段都可以包含 `{{name}}` 占位符
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestTemplate {
    /// HTTP 方法，缺省为 GET
    #[serde(default)]
    pub method: Method,

    /// 相对 base_url 的路径或完整 URL
    pub path: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub query: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<RequestBody>,

    /// 是否附加 Token
    #[serde(default)]
    pub auth: bool,

    /// 单个请求的超时（毫秒）
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RequestTemplate {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            auth: false,
            timeout_ms: None,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_json(mut self, data: Value) -> Self {
        self.body = Some(RequestBody::Json(data));
        self
    }

    pub fn with_form(mut self, fields: BTreeMap<String, String>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.body = Some(RequestBody::Text(text.to_string()));
        self
    }

    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// 用例中的一个步骤：请求、断言、提取
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub request: RequestTemplate,

    /// 断言表达式，加载时解析
    #[serde(default)]
    pub expect: Vec<Expectation>,

    /// 提取规则（变量名 → 来源）
    #[serde(default, deserialize_with = "deserialize_captures")]
    pub extract: Vec<VariableCapture>,
}

impl Step {
    pub fn new(name: impl Into<String>, request: RequestTemplate) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            request,
            expect: Vec::new(),
            extract: Vec::new(),
        }
    }

    pub fn with_expect(mut self, expectation: Expectation) -> Self {
        self.expect.push(expectation);
        self
    }

    pub fn with_extract(mut self, capture: VariableCapture) -> Self {
        self.extract.push(capture);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 报告中显示的名称；未命名时使用序号
    pub fn label(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("step-{}", index + 1)
        } else {
            self.name.clone()
        }
    }
}

/// 测试用例，加载后不可变
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestCase {
    pub id: String,

    /// 分组名（Grouped 模式使用）
    #[serde(default)]
    pub group: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl TestCase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: None,
            enabled: true,
            steps: Vec::new(),
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 所有启用的步骤
    pub fn active_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.enabled)
    }
}

/// 加载错误类型
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 格式错误
    #[error("Invalid JSON case file: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML 格式错误
    #[error("Invalid TOML case file: {0}")]
    Toml(#[from] toml::de::Error),

    /// 不支持的文件扩展名
    #[error("Unsupported case file format: {0}")]
    UnsupportedFormat(String),

    /// 空文件或没有找到用例
    #[error("No test cases found in {0}")]
    NoCases(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_defaults() {
        let step: Step = serde_json::from_value(json!({
            "request": {"path": "/ping"}
        }))
        .unwrap();

        assert!(step.enabled);
        assert_eq!(step.request.method, Method::Get);
        assert!(step.expect.is_empty());
        assert!(step.extract.is_empty());
        assert_eq!(step.label(0), "step-1");
    }

    #[test]
    fn test_step_with_expect_and_extract() {
        let step: Step = serde_json::from_value(json!({
            "name": "login",
            "request": {
                "method": "post",
                "path": "/login",
                "body": {"json": {"user": "{{username}}"}}
            },
            "expect": ["status == 200", "body.token exists"],
            "extract": {"token": "body.token", "trace": "header.x-trace-id"}
        }))
        .unwrap();

        assert_eq!(step.request.method, Method::Post);
        assert_eq!(step.expect.len(), 2);
        assert_eq!(step.extract.len(), 2);
        assert_eq!(step.label(3), "login");
    }

    #[test]
    fn test_invalid_expectation_rejected() {
        let result: Result<Step, _> = serde_json::from_value(json!({
            "request": {"path": "/ping"},
            "expect": ["status ~ 200"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_active_steps() {
        let case = TestCase::new("c1")
            .step(Step::new("a", RequestTemplate::new(Method::Get, "/a")))
            .step(Step::new("b", RequestTemplate::new(Method::Get, "/b")).disabled());

        let active: Vec<_> = case.active_steps().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "a");
    }
}
