use crate::assertion::extractor::extract_value;
use crate::assertion::types::{AssertExpr, AssertionResult, Expectation, Verdict};
use crate::http::Response;

/// 求值单个断言；取值失败记为 error，比较不成立记为 failure
pub fn evaluate_assertion(assertion: &AssertExpr, response: &Response) -> AssertionResult {
    let raw = assertion.to_string();

    let (left, expected) = match assertion {
        AssertExpr::Compare { left, op, right } => (left, format!("{} {}", op, right)),
        AssertExpr::Exists { path } => (path, "exists".to_string()),
    };

    let actual = match extract_value(response, left) {
        Ok(actual) => actual,
        Err(_) if matches!(assertion, AssertExpr::Exists { .. }) => {
            let message = format!("Expected {} to exist, but it was not found", left);
            return AssertionResult::failure(raw, "not found".to_string(), expected, message);
        }
        Err(e) => return AssertionResult::error(raw, e),
    };

    let passed = match assertion {
        AssertExpr::Compare { op, right, .. } => match actual.compare(*op, right) {
            Ok(passed) => passed,
            Err(e) => return AssertionResult::error(raw, e),
        },
        AssertExpr::Exists { .. } => true,
    };

    let actual = actual.to_string();
    if passed {
        AssertionResult::success(raw, actual, expected)
    } else {
        let message = format!("Expected {} to be {}, but got {}", left, expected, actual);
        AssertionResult::failure(raw, actual, expected, message)
    }
}

/// 对响应执行一个步骤的全部断言
///
/// 所有断言都会求值；任意一个失败则整体失败，`detail` 记录第一个失败。
pub fn verify(response: &Response, expectations: &[Expectation]) -> Verdict {
    let assertions: Vec<AssertionResult> = expectations
        .iter()
        .map(|expectation| {
            let mut result = evaluate_assertion(&expectation.expr, response);
            result.raw = expectation.raw.clone();
            result
        })
        .collect();

    let detail = assertions.iter().find(|r| !r.passed).map(|r| {
        format!(
            "{}: {}",
            r.raw,
            r.message.as_deref().unwrap_or("assertion failed")
        )
    });

    Verdict {
        passed: detail.is_none(),
        detail,
        assertions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::parser::parse_assertion;
    use crate::http::types::Status;
    use reqwest::header::HeaderMap;
    use std::time::Duration;

    fn create_test_response(status: u16, body: &str, duration_ms: u64) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());

        Response {
            status: Status::new(status).unwrap(),
            headers,
            body: body.to_string(),
            duration: Duration::from_millis(duration_ms),
        }
    }

    fn expectations(raw: &[&str]) -> Vec<Expectation> {
        raw.iter().map(|s| Expectation::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_evaluate_status_success() {
        let assertion = parse_assertion("status == 200").unwrap();
        let response = create_test_response(200, "{}", 100);
        let result = evaluate_assertion(&assertion, &response);

        assert!(result.passed);
        assert_eq!(result.actual, Some("200".to_string()));
    }

    #[test]
    fn test_evaluate_status_failure() {
        let assertion = parse_assertion("status == 200").unwrap();
        let response = create_test_response(404, "{}", 100);
        let result = evaluate_assertion(&assertion, &response);

        assert!(!result.passed);
        assert_eq!(result.actual, Some("404".to_string()));
        assert!(result.message.is_some());
    }

    #[test]
    fn test_evaluate_status_substring() {
        let assertion = parse_assertion("status contains 20").unwrap();
        let response = create_test_response(201, "{}", 100);
        assert!(evaluate_assertion(&assertion, &response).passed);
    }

    #[test]
    fn test_evaluate_body_partial_match() {
        let assertion = parse_assertion(r#"body.user contains {"name": "amy"}"#).unwrap();
        let response = create_test_response(200, r#"{"user": {"id": 1, "name": "amy"}}"#, 100);
        assert!(evaluate_assertion(&assertion, &response).passed);
    }

    #[test]
    fn test_evaluate_response_time() {
        let assertion = parse_assertion("response.time < 200").unwrap();
        let response = create_test_response(200, "{}", 100);
        let result = evaluate_assertion(&assertion, &response);

        assert!(result.passed);
        assert_eq!(result.actual, Some("100".to_string()));
    }

    #[test]
    fn test_evaluate_exists() {
        let assertion = parse_assertion("body.token exists").unwrap();
        let present = create_test_response(200, r#"{"token": "abc123"}"#, 100);
        let absent = create_test_response(200, r#"{}"#, 100);

        assert!(evaluate_assertion(&assertion, &present).passed);
        let result = evaluate_assertion(&assertion, &absent);
        assert!(!result.passed);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_evaluate_path_not_found() {
        let assertion = parse_assertion("body.missing == 123").unwrap();
        let response = create_test_response(200, r#"{}"#, 100);
        let result = evaluate_assertion(&assertion, &response);

        assert!(!result.passed);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_verify_all_pass() {
        let response = create_test_response(200, r#"{"id": 1}"#, 10);
        let verdict = verify(&response, &expectations(&["status == 200", "body.id exists"]));

        assert!(verdict.passed);
        assert!(verdict.detail.is_none());
        assert_eq!(verdict.assertions.len(), 2);
    }

    #[test]
    fn test_verify_records_first_failure() {
        let response = create_test_response(500, r#"{"id": 1}"#, 10);
        let verdict = verify(
            &response,
            &expectations(&["body.id == 1", "status == 200", "body.name exists"]),
        );

        assert!(!verdict.passed);
        assert_eq!(verdict.assertions.len(), 3);
        assert_eq!(verdict.assertions.iter().filter(|r| !r.passed).count(), 2);
        assert!(verdict.detail.unwrap().starts_with("status == 200:"));
    }

    #[test]
    fn test_verify_without_expectations_passes() {
        let response = create_test_response(404, "", 10);
        assert!(verify(&response, &[]).passed);
    }

    #[test]
    fn test_expectation_deserializes_from_string() {
        let parsed: Vec<Expectation> =
            serde_json::from_str(r#"["status == 200", "body.ok == true"]"#).unwrap();
        assert_eq!(parsed[0].raw, "status == 200");

        let bad: Result<Vec<Expectation>, _> = serde_json::from_str(r#"["status ~ 1"]"#);
        assert!(bad.is_err());
    }
}
